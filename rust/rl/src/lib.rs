//! Adversarial inverse reinforcement learning: recovers a reward function
//! from expert trajectories by training a reward-shaped discriminator
//! against a policy.

pub mod checkpoint;
pub mod config;
pub mod discriminator;
pub mod env_wrapper;
pub mod environments;
#[cfg(test)]
mod envs;
pub mod error;
pub mod expert;
pub mod features;
pub mod mdps;
pub mod policy;
pub mod reward_net;
pub mod rollout;
pub mod trainer;
pub mod trajectory;

pub use discriminator::{Discrimination, TrainReward, TransitionReward};
pub use env_wrapper::RewardWrapper;
pub use error::{AirlError, AirlResult};
pub use features::{FeatureEncoder, TransitionSchema};
pub use policy::{ActionProbabilities, PolicyOptimizer, SoftmaxPolicy};
pub use reward_net::{BaseReward, LinearRewardNet, RewardMode, RewardNet};
pub use trainer::{AirlTrainer, Phase, StopHandle, TrainingReport};
pub use trajectory::{Trajectory, Transition};
