//! Reward networks: an unshaped reward `r_θ` and a shaping potential `h_φ`,
//! combined into `f(s, a, s') = r_θ(s, a) + γ·h_φ(s') − h_φ(s)`.

use crate::error::{AirlError, AirlResult};
use crate::features::{kron, FeatureEncoder, TransitionSchema};
use crate::trajectory::Transition;
use gymnasium::ObsActSpaceItem;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Inputs of the unshaped reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMode {
    /// `r_θ(s)`
    #[default]
    StateOnly,
    /// `r_θ(s, a)`
    StateAction,
}

/// A reward that can be evaluated on its own, independent of any shaping.
pub trait BaseReward {
    fn mode(&self) -> RewardMode;

    fn evaluate(&self, state: &[ObsActSpaceItem], action: &[ObsActSpaceItem]) -> AirlResult<f64>;
}

/// The reward model the discriminator is built from.
pub trait RewardNet {
    type Unshaped: BaseReward + Clone + Serialize;

    fn mode(&self) -> RewardMode;

    fn gamma(&self) -> f64;

    /// Rejects transitions whose shapes do not fit the reward mode.
    fn validate(&self, t: &Transition) -> AirlResult<()>;

    fn evaluate_base(&self, state: &[ObsActSpaceItem], action: &[ObsActSpaceItem]) -> AirlResult<f64>;

    fn evaluate_shaping_potential(&self, state: &[ObsActSpaceItem]) -> AirlResult<f64>;

    fn evaluate_shaped(&self, t: &Transition) -> AirlResult<f64> {
        self.validate(t)?;
        let r = self.evaluate_base(&t.state, &t.action)?;
        let h = self.evaluate_shaping_potential(&t.state)?;
        let h_next = self.evaluate_shaping_potential(&t.next_state)?;
        Ok(r + self.gamma() * h_next - h)
    }

    /// Copy of `r_θ` alone.
    fn unshaped_reward(&self) -> Self::Unshaped;

    /// One gradient descent step. `grads` pairs each transition with `∂loss/∂f` at that transition.
    fn fit_step(
        &mut self,
        grads: &[(&Transition, f64)],
        learning_rate: f64,
        l2_penalty: f64,
    ) -> AirlResult<()>;
}

fn missing_action() -> AirlError {
    AirlError::config(
        "reward_net.mode",
        "state-action reward needs transitions that carry an action",
    )
}

/// `r_θ(x) = θ·x + b` over state features, or over the Kronecker product of
/// state and action features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearReward {
    pub schema: TransitionSchema,
    pub mode: RewardMode,
    pub theta: Array1<f64>,
    pub bias: f64,
}

impl LinearReward {
    fn zeros(schema: TransitionSchema, mode: RewardMode) -> Self {
        let dim = match mode {
            RewardMode::StateOnly => schema.state.dim(),
            RewardMode::StateAction => schema.state.dim() * schema.action.dim(),
        };
        Self {
            schema,
            mode,
            theta: Array1::zeros(dim),
            bias: 0.,
        }
    }

    pub fn features(
        &self,
        state: &[ObsActSpaceItem],
        action: &[ObsActSpaceItem],
    ) -> AirlResult<Array1<f64>> {
        let x_s = self.schema.state.encode(state)?;
        match self.mode {
            RewardMode::StateOnly => Ok(x_s),
            RewardMode::StateAction => {
                if action.is_empty() {
                    return Err(missing_action());
                }
                Ok(kron(&x_s, &self.schema.action.encode(action)?))
            }
        }
    }
}

impl BaseReward for LinearReward {
    fn mode(&self) -> RewardMode {
        self.mode
    }

    fn evaluate(&self, state: &[ObsActSpaceItem], action: &[ObsActSpaceItem]) -> AirlResult<f64> {
        Ok(self.theta.dot(&self.features(state, action)?) + self.bias)
    }
}

/// `h_φ(s) = φ·x_s + b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearShaping {
    pub encoder: FeatureEncoder,
    pub phi: Array1<f64>,
    pub bias: f64,
}

impl LinearShaping {
    fn zeros(encoder: FeatureEncoder) -> Self {
        Self {
            encoder,
            phi: Array1::zeros(encoder.dim()),
            bias: 0.,
        }
    }

    pub fn evaluate(&self, state: &[ObsActSpaceItem]) -> AirlResult<f64> {
        Ok(self.phi.dot(&self.encoder.encode(state)?) + self.bias)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRewardNet {
    reward: LinearReward,
    shaping: LinearShaping,
    gamma: f64,
}

impl LinearRewardNet {
    pub fn new(schema: TransitionSchema, mode: RewardMode, gamma: f64) -> AirlResult<Self> {
        Self::from_parts(
            LinearReward::zeros(schema, mode),
            LinearShaping::zeros(schema.state),
            gamma,
        )
    }

    pub fn from_parts(reward: LinearReward, shaping: LinearShaping, gamma: f64) -> AirlResult<Self> {
        if !(gamma > 0. && gamma <= 1.) {
            return Err(AirlError::config(
                "reward_net.gamma",
                format!("discount must be in (0, 1], got {gamma}"),
            ));
        }
        if shaping.encoder != reward.schema.state || shaping.phi.len() != shaping.encoder.dim() {
            return Err(AirlError::config(
                "reward_net.shaping",
                "shaping potential does not match the state encoder",
            ));
        }
        if reward.theta.len() != LinearReward::zeros(reward.schema, reward.mode).theta.len() {
            return Err(AirlError::config(
                "reward_net.theta",
                format!("{} parameters do not fit the {:?} features", reward.theta.len(), reward.mode),
            ));
        }

        Ok(Self {
            reward,
            shaping,
            gamma,
        })
    }

    pub fn schema(&self) -> &TransitionSchema {
        &self.reward.schema
    }

    pub fn reward(&self) -> &LinearReward {
        &self.reward
    }

    pub fn shaping(&self) -> &LinearShaping {
        &self.shaping
    }

    pub fn set_base(&mut self, theta: Array1<f64>, bias: f64) -> AirlResult<()> {
        if theta.len() != self.reward.theta.len() {
            return Err(AirlError::config(
                "reward_net.theta",
                format!("expected {} parameters, got {}", self.reward.theta.len(), theta.len()),
            ));
        }
        self.reward.theta = theta;
        self.reward.bias = bias;
        Ok(())
    }

    pub fn set_shaping(&mut self, phi: Array1<f64>, bias: f64) -> AirlResult<()> {
        if phi.len() != self.shaping.phi.len() {
            return Err(AirlError::config(
                "reward_net.phi",
                format!("expected {} parameters, got {}", self.shaping.phi.len(), phi.len()),
            ));
        }
        self.shaping.phi = phi;
        self.shaping.bias = bias;
        Ok(())
    }
}

impl RewardNet for LinearRewardNet {
    type Unshaped = LinearReward;

    fn mode(&self) -> RewardMode {
        self.reward.mode
    }

    fn gamma(&self) -> f64 {
        self.gamma
    }

    fn validate(&self, t: &Transition) -> AirlResult<()> {
        if self.reward.mode == RewardMode::StateAction && t.action.is_empty() {
            return Err(missing_action());
        }
        Ok(())
    }

    fn evaluate_base(&self, state: &[ObsActSpaceItem], action: &[ObsActSpaceItem]) -> AirlResult<f64> {
        self.reward.evaluate(state, action)
    }

    fn evaluate_shaping_potential(&self, state: &[ObsActSpaceItem]) -> AirlResult<f64> {
        self.shaping.evaluate(state)
    }

    fn unshaped_reward(&self) -> LinearReward {
        self.reward.clone()
    }

    fn fit_step(
        &mut self,
        grads: &[(&Transition, f64)],
        learning_rate: f64,
        l2_penalty: f64,
    ) -> AirlResult<()> {
        let mut d_theta = &self.reward.theta * l2_penalty;
        let mut d_phi = &self.shaping.phi * l2_penalty;
        let mut d_theta_bias = 0.;
        let mut d_phi_bias = 0.;

        for (t, g) in grads {
            let x = self.reward.features(&t.state, &t.action)?;
            let x_s = self.shaping.encoder.encode(&t.state)?;
            let x_next = self.shaping.encoder.encode(&t.next_state)?;

            d_theta.scaled_add(*g, &x);
            d_theta_bias += g;
            // ∂f/∂φ = γ·x_s' − x_s
            d_phi.scaled_add(g * self.gamma, &x_next);
            d_phi.scaled_add(-g, &x_s);
            d_phi_bias += g * (self.gamma - 1.);
        }

        if d_theta.iter().chain(d_phi.iter()).any(|v| !v.is_finite()) {
            return Err(AirlError::Numerical("reward gradient is not finite".into()));
        }

        self.reward.theta.scaled_add(-learning_rate, &d_theta);
        self.reward.bias -= learning_rate * d_theta_bias;
        self.shaping.phi.scaled_add(-learning_rate, &d_phi);
        self.shaping.bias -= learning_rate * d_phi_bias;

        Ok(())
    }
}
