//! The generator: a stochastic policy and the optimizer that improves it.

use crate::error::{AirlError, AirlResult};
use crate::features::{FeatureEncoder, TransitionSchema};
use crate::rollout::generate_trajectories;
use gymnasium::{Env, ObsActSpaceItem};
use ndarray::{Array1, Array2, Axis};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

pub trait ActionProbabilities {
    /// `π(a|s)`
    fn action_probability(
        &self,
        state: &[ObsActSpaceItem],
        action: &[ObsActSpaceItem],
    ) -> AirlResult<f64>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImproveStats {
    pub iterations: usize,
    pub episodes: usize,
    /// Mean undiscounted return per episode under the env's reward.
    pub mean_return: f64,
}

pub trait PolicyOptimizer: ActionProbabilities {
    /// Samples an action, returning it with its probability.
    fn act(&mut self, state: &[ObsActSpaceItem]) -> AirlResult<(Vec<ObsActSpaceItem>, f64)>;

    /// Snapshot of the current action probabilities.
    fn frozen(&self) -> Rc<dyn ActionProbabilities>;

    /// Improves the policy against whatever reward `env` hands out.
    fn improve(&mut self, env: &mut dyn Env, n_iterations: usize) -> AirlResult<ImproveStats>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub learning_rate: f64,
    pub episodes_per_iteration: usize,
    pub max_episode_steps: usize,
    /// Discount of the rewards-to-go.
    pub discount: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            episodes_per_iteration: 16,
            max_episode_steps: 100,
            discount: 0.9,
        }
    }
}

/// Parameters of a linear softmax policy: `π(·|s) = softmax(W·x_s + b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxParams {
    pub state: FeatureEncoder,
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl SoftmaxParams {
    pub fn n_actions(&self) -> usize {
        self.bias.len()
    }

    pub fn probabilities(&self, state: &[ObsActSpaceItem]) -> AirlResult<Array1<f64>> {
        let x = self.state.encode(state)?;
        let logits = self.weights.dot(&x) + &self.bias;
        let max = logits.fold(f64::NEG_INFINITY, |m, &l| m.max(l));
        let exp = logits.mapv(|l| (l - max).exp());
        let z = exp.sum();
        if !z.is_finite() || z <= 0. {
            return Err(AirlError::Numerical(format!(
                "softmax normalizer is {z} for {state:?}"
            )));
        }
        Ok(exp / z)
    }

    fn action_index(&self, action: &[ObsActSpaceItem]) -> AirlResult<usize> {
        FeatureEncoder::OneHot {
            n: self.n_actions(),
        }
        .index(action)
    }
}

impl ActionProbabilities for SoftmaxParams {
    fn action_probability(
        &self,
        state: &[ObsActSpaceItem],
        action: &[ObsActSpaceItem],
    ) -> AirlResult<f64> {
        Ok(self.probabilities(state)?[self.action_index(action)?])
    }
}

/// Linear softmax policy over discrete actions, trained with REINFORCE
/// (discounted rewards-to-go, mean baseline).
#[derive(Debug)]
pub struct SoftmaxPolicy {
    params: SoftmaxParams,
    config: PolicyConfig,
    rng: StdRng,
}

impl SoftmaxPolicy {
    pub fn new(schema: &TransitionSchema, config: PolicyConfig, seed: u64) -> AirlResult<Self> {
        let n_actions = match schema.action {
            FeatureEncoder::OneHot { n } => n,
            FeatureEncoder::Dense { .. } => {
                return Err(AirlError::config(
                    "policy",
                    "softmax policy needs a discrete action space",
                ))
            }
        };
        let params = SoftmaxParams {
            state: schema.state,
            weights: Array2::zeros((n_actions, schema.state.dim())),
            bias: Array1::zeros(n_actions),
        };
        Self::from_params(params, config, seed)
    }

    pub fn from_params(params: SoftmaxParams, config: PolicyConfig, seed: u64) -> AirlResult<Self> {
        if params.weights.dim() != (params.n_actions(), params.state.dim()) {
            return Err(AirlError::config(
                "policy.weights",
                format!(
                    "weights of shape {:?} do not fit {} actions over {:?}",
                    params.weights.dim(),
                    params.n_actions(),
                    params.state
                ),
            ));
        }
        if !(config.discount > 0. && config.discount <= 1.) {
            return Err(AirlError::config(
                "policy.discount",
                format!("discount must be in (0, 1], got {}", config.discount),
            ));
        }

        Ok(Self {
            params,
            config,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn params(&self) -> &SoftmaxParams {
        &self.params
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    fn sample(&mut self, state: &[ObsActSpaceItem]) -> AirlResult<(usize, f64)> {
        let probs = self.params.probabilities(state)?;
        let dist = WeightedIndex::new(probs.iter())
            .map_err(|e| AirlError::Numerical(format!("cannot sample action: {e}")))?;
        let a = dist.sample(&mut self.rng);
        Ok((a, probs[a]))
    }
}

impl ActionProbabilities for SoftmaxPolicy {
    fn action_probability(
        &self,
        state: &[ObsActSpaceItem],
        action: &[ObsActSpaceItem],
    ) -> AirlResult<f64> {
        self.params.action_probability(state, action)
    }
}

/// `G_t = r_t + γ·G_{t+1}` within one episode.
fn rewards_to_go(rewards: impl DoubleEndedIterator<Item = f64>, discount: f64) -> Vec<f64> {
    let mut acc = 0.;
    let mut out = rewards
        .rev()
        .map(|r| {
            acc = r + discount * acc;
            acc
        })
        .collect::<Vec<_>>();
    out.reverse();
    out
}

impl PolicyOptimizer for SoftmaxPolicy {
    fn act(&mut self, state: &[ObsActSpaceItem]) -> AirlResult<(Vec<ObsActSpaceItem>, f64)> {
        let (a, p) = self.sample(state)?;
        Ok((vec![ObsActSpaceItem::Discrete(a as i32)], p))
    }

    fn frozen(&self) -> Rc<dyn ActionProbabilities> {
        Rc::new(self.params.clone())
    }

    fn improve(&mut self, env: &mut dyn Env, n_iterations: usize) -> AirlResult<ImproveStats> {
        let mut stats = ImproveStats::default();
        let mut total_return = 0.;

        for _ in 0..n_iterations {
            let (episodes, max_steps) = (
                self.config.episodes_per_iteration,
                self.config.max_episode_steps,
            );
            let trajectories = generate_trajectories(&mut *env, episodes, max_steps, None, |s| {
                self.act(s).map(|(a, _)| a)
            })?;

            let mut samples = Vec::new();
            for traj in &trajectories {
                total_return += traj.total_reward();
                let returns = rewards_to_go(traj.iter().map(|t| t.reward), self.config.discount);
                samples.extend(traj.iter().zip(returns));
            }
            stats.iterations += 1;
            stats.episodes += trajectories.len();
            if samples.is_empty() {
                continue;
            }

            let baseline = samples.iter().map(|(_, g)| g).sum::<f64>() / samples.len() as f64;
            let mut d_weights = Array2::<f64>::zeros(self.params.weights.dim());
            let mut d_bias = Array1::<f64>::zeros(self.params.n_actions());
            for (t, g) in &samples {
                let x = self.params.state.encode(&t.state)?;
                let a = self.params.action_index(&t.action)?;
                // ∇ log π(a|s) w.r.t. the logits is onehot(a) − π(·|s).
                let mut score = -self.params.probabilities(&t.state)?;
                score[a] += 1.;
                score *= g - baseline;

                let outer = score
                    .view()
                    .insert_axis(Axis(1))
                    .dot(&x.view().insert_axis(Axis(0)));
                d_weights += &outer;
                d_bias += &score;
            }

            let scale = self.config.learning_rate / samples.len() as f64;
            if d_weights.iter().chain(d_bias.iter()).any(|v| !v.is_finite()) {
                return Err(AirlError::Numerical("policy gradient is not finite".into()));
            }
            self.params.weights.scaled_add(scale, &d_weights);
            self.params.bias.scaled_add(scale, &d_bias);
        }

        if stats.episodes > 0 {
            stats.mean_return = total_return / stats.episodes as f64;
        }
        Ok(stats)
    }
}
