use crate::discriminator::DiscriminatorConfig;
use crate::error::{AirlError, AirlResult};
use crate::expert::ExpertConfig;
use crate::policy::PolicyConfig;
use crate::reward_net::RewardMode;
use crate::trainer::TrainerConfig;
use gymnasium::envs::{FrozenLake, MAP_4X4};
use gymnasium::{Env, Environment, TabularModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Complete configuration of an AIRL run. Every field has a default, so a
/// config file only needs the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirlConfig {
    pub env: EnvConfig,
    pub expert: ExpertConfig,
    pub reward_net: RewardNetConfig,
    pub policy: PolicyConfig,
    pub trainer: TrainerConfig,
    /// Wall-clock budget of `train`; checked at epoch boundaries.
    pub max_wall_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// FrozenLake rows of S, F, H and G tiles.
    pub map: Vec<String>,
    pub is_slippery: bool,
    /// Episodes are truncated after this many steps.
    pub max_episode_steps: Option<usize>,
    /// Use `FrozenLake-v1` on a gymnasium http server instead of the local simulator.
    pub api_url: Option<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            map: MAP_4X4.iter().map(|r| r.to_string()).collect(),
            is_slippery: false,
            max_episode_steps: None,
            api_url: None,
        }
    }
}

/// An environment the expert planner can solve.
pub trait TabularEnv: Env + TabularModel {}

impl<T: Env + TabularModel + ?Sized> TabularEnv for T {}

impl EnvConfig {
    pub fn make_env(&self) -> AirlResult<Box<dyn TabularEnv>> {
        let map = self.map.iter().map(String::as_str).collect::<Vec<_>>();
        match &self.api_url {
            None => {
                let env = FrozenLake::new(&map, self.is_slippery)?;
                Ok(match self.max_episode_steps {
                    Some(n) => Box::new(env.with_max_episode_steps(n)),
                    None => Box::new(env),
                })
            }
            Some(api_url) => {
                let env = Environment::new(
                    api_url,
                    "FrozenLake-v1",
                    self.max_episode_steps.map(|n| n as i32),
                    None,
                    None,
                    &[
                        ("desc", Value::from(map)),
                        ("is_slippery", Value::from(self.is_slippery)),
                    ],
                )?;
                Ok(Box::new(env))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardNetConfig {
    pub mode: RewardMode,
    pub gamma: f64,
}

impl Default for RewardNetConfig {
    fn default() -> Self {
        Self {
            mode: RewardMode::StateOnly,
            gamma: 0.9,
        }
    }
}

fn check_unit_interval(param: &str, value: f64) -> AirlResult<()> {
    if value > 0. && value <= 1. {
        Ok(())
    } else {
        Err(AirlError::config(param, format!("must be in (0, 1], got {value}")))
    }
}

fn check_positive(param: &str, value: f64) -> AirlResult<()> {
    if value.is_finite() && value > 0. {
        Ok(())
    } else {
        Err(AirlError::config(param, format!("must be positive, got {value}")))
    }
}

impl AirlConfig {
    pub fn load(path: impl AsRef<Path>) -> AirlResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AirlResult<()> {
        if self.env.map.is_empty() {
            return Err(AirlError::config("env.map", "must have at least one row"));
        }
        check_unit_interval("reward_net.gamma", self.reward_net.gamma)?;
        check_unit_interval("expert.gamma", self.expert.gamma)?;
        check_positive("expert.theta", self.expert.theta)?;
        check_unit_interval("policy.discount", self.policy.discount)?;
        check_positive("policy.learning_rate", self.policy.learning_rate)?;
        if self.policy.episodes_per_iteration == 0 || self.policy.max_episode_steps == 0 {
            return Err(AirlError::config(
                "policy",
                "episodes_per_iteration and max_episode_steps must be at least 1",
            ));
        }
        if self.expert.episodes == 0 {
            return Err(AirlError::config("expert.episodes", "must be at least 1"));
        }
        self.trainer.validate()
    }

    pub fn discriminator(&self) -> &DiscriminatorConfig {
        &self.trainer.discriminator
    }
}
