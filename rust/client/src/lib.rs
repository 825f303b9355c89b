extern crate rand;
extern crate reqwest;
extern crate serde;
extern crate serde_json;

pub mod envs;
pub mod error;
pub mod mdps;

pub use error::*;

use rand::prelude::*;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{to_value, Map, Value};
use std::collections::HashMap;
use std::rc::Rc;
use value_extensions::*;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObsActSpaceItem {
    Discrete(Discrete),
    Continous(Continous),
}

impl ObsActSpaceItem {
    pub fn discrete_value(&self) -> Option<Discrete> {
        if let Self::Discrete(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    pub fn box_value(&self) -> Option<Continous> {
        if let Self::Continous(n) = self {
            Some(*n)
        } else {
            None
        }
    }
}

pub type Discrete = i32;
pub type Continous = f64;

#[derive(Debug, Clone, PartialEq)]
pub enum ObsActSpace {
    /// Refer: https://www.gymlibrary.dev/api/spaces/#discrete
    Discrete {
        n: Discrete,
    },

    /// Refer: https://www.gymlibrary.dev/api/spaces/#box
    Box {
        shape: Vec<Discrete>,
        high: Vec<Continous>,
        low: Vec<Continous>,
    },

    // Refer: https://www.gymlibrary.dev/api/spaces/#tuple
    Tuple {
        spaces: Vec<ObsActSpace>,
    },
}

impl ObsActSpace {
    pub fn from_json(info: &Map<String, Value>) -> GymResult<Self> {
        let name = info
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| GymError::Protocol("space info carries no name".into()))?;

        match name {
            "Discrete" => Ok(ObsActSpace::Discrete {
                n: as_discrete(&info["n"])?,
            }),
            "Box" => Ok(ObsActSpace::Box {
                shape: as_discrete_item_vec(&info["shape"])?,
                high: as_continous_item_vec(&info["high"])?,
                low: as_continous_item_vec(&info["low"])?,
            }),
            "Tuple" => Err(GymError::Protocol(
                "Parsing for Tuple spaces is not yet implemented".into(),
            )),
            e => Err(GymError::Protocol(format!("Unrecognized space name: {e}"))),
        }
    }

    /// Number of scalar items an element of this space is made of.
    pub fn flat_len(&self) -> usize {
        match self {
            ObsActSpace::Discrete { .. } => 1,
            ObsActSpace::Box { shape, .. } => shape.iter().map(|&d| d.max(0) as usize).product(),
            ObsActSpace::Tuple { spaces } => spaces.iter().map(ObsActSpace::flat_len).sum(),
        }
    }

    /// Checks that `items` is a member of the space.
    pub fn check(&self, items: &[ObsActSpaceItem]) -> GymResult<()> {
        match self {
            ObsActSpace::Discrete { n } => match items {
                [ObsActSpaceItem::Discrete(i)] if (0..*n).contains(i) => Ok(()),
                [ObsActSpaceItem::Discrete(i)] => Err(GymError::InvalidAction(format!(
                    "For Discrete space: {i} is outside 0..{n}."
                ))),
                [_] => Err(GymError::InvalidAction(
                    "For Discrete space: Expected only one action of type Discrete.".into(),
                )),
                _ => Err(GymError::InvalidAction(
                    "For Discrete space: Expected only one action.".into(),
                )),
            },

            ObsActSpace::Box { .. } => {
                if items.len() != self.flat_len() {
                    return Err(GymError::InvalidAction(
                        "For Box space: Expected same number of actions as shape.".into(),
                    ));
                }
                if items.iter().any(|a| a.box_value().is_none()) {
                    return Err(GymError::InvalidAction(
                        "For Box space: Actions should all be f64".into(),
                    ));
                }
                Ok(())
            }

            // TODO: This space thing is a bad design.
            ObsActSpace::Tuple { .. } => Err(GymError::InvalidAction(
                "Actions for Tuple spaces not implemented yet".into(),
            )),
        }
    }

    /// Uniform sample from the space. Unbounded box dimensions are sampled from [-1, 1].
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> GymResult<Vec<ObsActSpaceItem>> {
        match self {
            ObsActSpace::Discrete { n } if *n > 0 => {
                Ok(vec![ObsActSpaceItem::Discrete(rng.gen_range(0..*n))])
            }
            ObsActSpace::Discrete { n } => Err(GymError::InvalidAction(format!(
                "Cannot sample from an empty Discrete space of size {n}."
            ))),
            ObsActSpace::Box { low, high, .. } => Ok(low
                .iter()
                .zip(high.iter())
                .map(|(&lo, &hi)| {
                    let (lo, hi) = if lo.is_finite() && hi.is_finite() && lo < hi {
                        (lo, hi)
                    } else {
                        (-1., 1.)
                    };
                    ObsActSpaceItem::Continous(rng.gen_range(lo..hi))
                })
                .collect()),
            ObsActSpace::Tuple { .. } => Err(GymError::InvalidAction(
                "Sampling for Tuple spaces not implemented yet".into(),
            )),
        }
    }

    pub fn action_to_json(&self, action: &[ObsActSpaceItem]) -> GymResult<Value> {
        self.check(action)?;
        let value = match self {
            ObsActSpace::Discrete { .. } => to_value(action[0].discrete_value()),
            _ => to_value(
                action
                    .iter()
                    .filter_map(ObsActSpaceItem::box_value)
                    .collect::<Vec<_>>(),
            ),
        };
        value.map_err(|e| GymError::Protocol(e.to_string()))
    }

    pub fn items_from_json(&self, vals: &[Value]) -> GymResult<Vec<ObsActSpaceItem>> {
        match self {
            ObsActSpace::Discrete { n: _ } => vals
                .iter()
                .map(|v| as_discrete(v).map(ObsActSpaceItem::Discrete))
                .collect(),

            ObsActSpace::Box {
                shape: _,
                high: _,
                low: _,
            } => vals
                .iter()
                .map(|v| as_continous(v).map(ObsActSpaceItem::Continous))
                .collect(),

            ObsActSpace::Tuple { spaces: _ } => Err(GymError::Protocol(
                "Not yet implemented for tuples.".into(),
            )),
        }
    }
}

#[derive(Debug)]
pub enum RenderFrame {
    Ansi(String),
    Rgb(usize, usize, String),
}

impl RenderFrame {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RenderFrame::Ansi(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_rgb(&self) -> Option<(&usize, &usize, &String)> {
        match self {
            RenderFrame::Rgb(r, c, d) => Some((r, c, d)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next_state: Discrete,
    pub probability: Continous,
    pub reward: f64,
    pub done: bool,
}

pub type Transitions = HashMap<(Discrete, Discrete), Vec<Transition>>;

#[derive(Debug, Clone)]
pub struct StepInfo {
    pub observation: Vec<ObsActSpaceItem>,
    pub reward: f64,
    pub truncated: bool,
    pub terminated: bool,
    pub info: Value,
}

impl StepInfo {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// The reset/step contract every environment exposes.
/// Refer: https://gymnasium.farama.org/api/env/
pub trait Env {
    fn name(&self) -> String;

    /// The Space object corresponding to valid observations.
    fn observation_space(&self) -> &ObsActSpace;

    /// The Space object corresponding to valid actions.
    fn action_space(&self) -> &ObsActSpace;

    fn reset(&mut self, seed: Option<u64>) -> GymResult<Vec<ObsActSpaceItem>>;

    fn step(&mut self, action: &[ObsActSpaceItem]) -> GymResult<StepInfo>;
}

impl<E: Env + ?Sized> Env for Box<E> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn observation_space(&self) -> &ObsActSpace {
        (**self).observation_space()
    }

    fn action_space(&self) -> &ObsActSpace {
        (**self).action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> GymResult<Vec<ObsActSpaceItem>> {
        (**self).reset(seed)
    }

    fn step(&mut self, action: &[ObsActSpaceItem]) -> GymResult<StepInfo> {
        (**self).step(action)
    }
}

/// Environments with discrete observation and action spaces that expose their dynamics.
pub trait TabularModel {
    fn transitions(&self) -> GymResult<Rc<Transitions>>;
}

impl<T: TabularModel + ?Sized> TabularModel for Box<T> {
    fn transitions(&self) -> GymResult<Rc<Transitions>> {
        (**self).transitions()
    }
}

/// Create a gymnasium environment on a gymnasium http server or get reference to an existing one.
/// NOTE: All APIs are sync for now as the server is expected to be local.
#[derive(Debug)]
pub struct Environment {
    client: Client,
    api_url: String,
    instance_id: String,
    obs_space: ObsActSpace,
    act_space: ObsActSpace,
}

impl Environment {
    pub fn envs(api_url: &str) -> GymResult<HashMap<String, String>> {
        let client = Client::new(api_url)?;

        let url = client.make_api_url("");
        let val = client.http_get(&url)?;

        let obj = val["all_envs"]
            .as_object()
            .ok_or_else(|| GymError::Protocol("No all_envs returned.".into()))?;

        Ok(obj
            .into_iter()
            .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
            .collect())
    }

    pub fn new(
        api_url: &str,
        env_name: &str,
        max_episode_steps: Option<Discrete>,
        auto_reset: Option<bool>,
        disable_env_checker: Option<bool>,
        kwargs: &[(&str, Value)],
    ) -> GymResult<Self> {
        let mut body = [("env_id", Value::from(env_name))]
            .into_iter()
            .collect::<HashMap<&str, Value>>();

        if let Some(max_episode_steps) = max_episode_steps {
            body.insert("max_episode_steps", Value::from(max_episode_steps));
        }

        if let Some(auto_reset) = auto_reset {
            body.insert("auto_reset", Value::from(auto_reset));
        }

        if let Some(disable_env_checker) = disable_env_checker {
            body.insert("disable_env_checker", Value::from(disable_env_checker));
        }

        let kwargs = kwargs.iter().cloned().collect::<HashMap<&str, Value>>();
        body.insert(
            "kwargs",
            to_value(kwargs).map_err(|e| GymError::Protocol(e.to_string()))?,
        );

        let c = Client::new(api_url)?;
        let base_url = c.make_api_url("");
        let obj = c.http_post(&base_url, &body)?;
        let inst_id = obj["instance_id"]
            .as_str()
            .ok_or_else(|| GymError::Protocol("No instance_id returned.".into()))?;
        tracing::info!(env = env_name, instance_id = inst_id, "created gymnasium environment");

        Self::reference(api_url, inst_id)
    }

    pub fn reference(api_url: &str, instance_id: &str) -> GymResult<Self> {
        let client = Client::new(api_url)?;

        let obs_space = client.space(&format!("{}/observation_space/", instance_id))?;
        let act_space = client.space(&format!("{}/action_space/", instance_id))?;

        let env_api_url = client.make_api_url(&format!("{instance_id}/"));
        Ok(Self {
            client,
            api_url: env_api_url,
            instance_id: instance_id.to_string(),
            obs_space,
            act_space,
        })
    }

    pub fn client_base_url(&self) -> &str {
        &self.client.base_url
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn action_space_sample(&self) -> GymResult<Vec<ObsActSpaceItem>> {
        let url = self.make_api_url("action_space/sample/");
        let obj = self.client.http_get(&url)?;
        match &obj["action"] {
            Value::Array(vals) => self.act_space.items_from_json(vals),
            v => self.act_space.items_from_json(std::slice::from_ref(v)),
        }
    }

    pub fn render(&self) -> GymResult<RenderFrame> {
        let url = self.make_api_url("render/");
        let obj = self.client.http_get(&url)?;

        let rf = &obj["render_frame"];
        if let Some(s) = rf.as_str() {
            Ok(RenderFrame::Ansi(s.to_string()))
        } else if let Some(obj) = rf.as_object() {
            let rows = as_discrete(&obj["rows"])? as usize;
            let cols = as_discrete(&obj["cols"])? as usize;
            let data = obj["data"].as_str().unwrap_or_default().to_string();

            Ok(RenderFrame::Rgb(rows, cols, data))
        } else {
            Err(GymError::Protocol(format!("Unrecognized render frame: {rf}")))
        }
    }

    fn make_api_url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }
}

impl Env for Environment {
    fn name(&self) -> String {
        self.client
            .http_get(&self.api_url)
            .ok()
            .and_then(|obj| obj["id"].as_str().map(str::to_string))
            .unwrap_or_else(|| self.instance_id.clone())
    }

    /// The Space object corresponding to valid actions, all valid actions should be contained with the space.
    /// For example, if the action space is of type Discrete and gives the value Discrete(2), this means there
    /// are two valid discrete actions: 0 & 1.
    /// Refer: https://gymnasium.farama.org/api/env/#gymnasium.Env.action_space
    fn action_space(&self) -> &ObsActSpace {
        &self.act_space
    }

    /// The Space object corresponding to valid observations, all valid observations should be contained with
    /// the space. For example, if the observation space is of type Box and the shape of the object is (4,),
    /// this denotes a valid observation will be an array of 4 numbers. We can check the box bounds as well with attributes.
    /// Refer: https://gymnasium.farama.org/api/env/#gymnasium.Env.observation_space
    fn observation_space(&self) -> &ObsActSpace {
        &self.obs_space
    }

    fn reset(&mut self, seed: Option<u64>) -> GymResult<Vec<ObsActSpaceItem>> {
        let mut body = HashMap::from([]);
        if let Some(seed) = seed {
            let _ = body.insert("seed", seed.to_string());
        }

        let url = self.make_api_url("reset/");
        let obj = self.client.http_post(&url, &body)?;
        let obs = as_array(&obj["observation"])?;
        self.obs_space.items_from_json(obs)
    }

    fn step(&mut self, action: &[ObsActSpaceItem]) -> GymResult<StepInfo> {
        let req = HashMap::from([("action", self.act_space.action_to_json(action)?)]);

        let url = self.make_api_url("step/");
        let obj = self.client.http_post(&url, &req)?;
        let observation = as_array(&obj["observation"])?;
        let observation = self.obs_space.items_from_json(observation)?;

        Ok(StepInfo {
            observation,
            reward: as_continous(&obj["reward"])?,
            truncated: as_bool(&obj["truncated"])?,
            terminated: as_bool(&obj["terminated"])?,
            info: obj["info"].clone(),
        })
    }
}

impl TabularModel for Environment {
    fn transitions(&self) -> GymResult<Rc<Transitions>> {
        let url = self.make_api_url("transitions/");
        let obj = self.client.http_get(&url)?;
        let obj = obj["transitions"]
            .as_object()
            .ok_or_else(|| GymError::Protocol("No transitions returned.".into()))?;

        let (ObsActSpace::Discrete { n: n_s }, ObsActSpace::Discrete { n: n_a }) =
            (&self.obs_space, &self.act_space)
        else {
            return Err(GymError::Protocol("Cannot get transition probabilities for environments that dont have discrete observation and action spaces.".into()));
        };

        let mut transitions: Transitions = HashMap::new();
        for s in 0..*n_s {
            let s_trans = obj
                .get(&s.to_string())
                .and_then(Value::as_object)
                .ok_or_else(|| GymError::Protocol(format!("No transitions for state {s}.")))?;
            for a in 0..*n_a {
                let a_trans = as_array(&s_trans[&a.to_string()])?;
                let ts = a_trans
                    .iter()
                    .map(|t| {
                        let t = as_array(t)?;
                        if t.len() != 4 {
                            return Err(GymError::Protocol(format!(
                                "Malformed transition for ({s}, {a})."
                            )));
                        }
                        Ok(Transition {
                            probability: as_continous(&t[0])?,
                            next_state: as_discrete(&t[1])?,
                            reward: as_continous(&t[2])?,
                            done: as_bool(&t[3])?,
                        })
                    })
                    .collect::<GymResult<Vec<_>>>()?;

                transitions.insert((s, a), ts);
            }
        }

        Ok(Rc::new(transitions))
    }
}

#[derive(Debug)]
pub struct Client {
    base_url: String,
    api_url: String,
    client: reqwest::blocking::Client,
}

impl Client {
    pub fn new(base_url: &str) -> GymResult<Self> {
        let mut base_url = base_url.replace("//localhost:", "//127.0.0.1:");
        if base_url.ends_with('/') {
            _ = base_url.remove(base_url.len() - 1);
        }

        let api_url = format!("{base_url}/v1/envs/");

        Ok(Self {
            base_url,
            api_url,
            client: reqwest::blocking::Client::builder().build()?,
        })
    }

    pub fn make_api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn space(&self, path: &str) -> GymResult<ObsActSpace> {
        let obj = self.http_get(&self.make_api_url(path))?;
        let info = obj["info"]
            .as_object()
            .ok_or_else(|| GymError::Protocol(format!("No space info at {path}.")))?;
        ObsActSpace::from_json(info)
    }

    fn http_get(&self, url: &str) -> GymResult<Value> {
        let res = self
            .client
            .get(url)
            .headers(Self::construct_common_headers())
            .send()?;
        Ok(res.error_for_status()?.json::<Value>()?)
    }

    fn http_post<T: Serialize>(&self, url: &str, body: &HashMap<&str, T>) -> GymResult<Value> {
        let res = self
            .client
            .post(url)
            .headers(Self::construct_common_headers())
            .json(body)
            .send()?;
        Ok(res.error_for_status()?.json::<Value>()?)
    }

    fn construct_common_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

mod value_extensions {
    use super::*;

    pub fn as_array(val: &Value) -> GymResult<&Vec<Value>> {
        val.as_array()
            .ok_or_else(|| GymError::Protocol(format!("Expected an array, got {val}.")))
    }

    pub fn as_bool(val: &Value) -> GymResult<bool> {
        val.as_bool()
            .ok_or_else(|| GymError::Protocol(format!("Expected a bool, got {val}.")))
    }

    pub fn as_discrete(val: &Value) -> GymResult<Discrete> {
        val.as_i64()
            .map(|x| x as Discrete)
            .ok_or_else(|| GymError::Protocol(format!("Expected an integer, got {val}.")))
    }

    pub fn as_continous(val: &Value) -> GymResult<Continous> {
        val.as_f64()
            .map(|x| x as Continous)
            .ok_or_else(|| GymError::Protocol(format!("Expected a number, got {val}.")))
    }

    pub fn as_discrete_item_vec(val: &Value) -> GymResult<Vec<Discrete>> {
        as_array(val)?.iter().map(as_discrete).collect()
    }

    pub fn as_continous_item_vec(val: &Value) -> GymResult<Vec<Continous>> {
        as_array(val)?.iter().map(as_continous).collect()
    }
}
