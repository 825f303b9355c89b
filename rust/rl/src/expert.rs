//! Expert demonstrations from a planner that knows the true reward.

use crate::environments::GymAdapter;
use crate::error::AirlResult;
use crate::mdps::{MdpSolver, MdpSolverPolicy, PolicyIteration};
use crate::rollout::generate_trajectories;
use crate::trajectory::Trajectory;
use gymnasium::mdps::Policy;
use gymnasium::{Env, TabularModel};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpertConfig {
    pub episodes: usize,
    pub max_episode_steps: usize,
    /// Discount the planner optimizes.
    pub gamma: f64,
    /// Policy evaluation stops once no state value moves by more than this.
    pub theta: f64,
    pub seed: u64,
}

impl Default for ExpertConfig {
    fn default() -> Self {
        Self {
            episodes: 32,
            max_episode_steps: 100,
            gamma: 0.9,
            theta: 1e-8,
            seed: 0,
        }
    }
}

/// Solves `env`'s MDP with policy iteration.
pub fn solve<E>(env: &E, gamma: f64, theta: f64) -> AirlResult<PolicyIteration>
where
    E: Env + TabularModel + ?Sized,
{
    let mdp = Rc::new(GymAdapter::new(env, gamma)?);
    let mut pi = PolicyIteration::new(mdp, 0., 0);
    let (stable, iterations) = pi.exec(theta, None);
    info!(env = %env.name(), stable, iterations, "expert policy solved");
    Ok(pi)
}

/// Rolls out the optimal policy of `env` under its native reward.
pub fn expert_trajectories<E>(env: &mut E, config: &ExpertConfig) -> AirlResult<Vec<Trajectory>>
where
    E: Env + TabularModel + ?Sized,
{
    let pi = solve(env, config.gamma, config.theta)?;
    let mut policy = MdpSolverPolicy::new(Rc::new(pi) as Rc<dyn MdpSolver<bool>>);

    let trajectories = generate_trajectories(
        env,
        config.episodes,
        config.max_episode_steps,
        Some(config.seed),
        |s| Ok(policy.policy(s)?),
    )?;
    info!(
        episodes = trajectories.len(),
        mean_return = trajectories.iter().map(Trajectory::total_reward).sum::<f64>()
            / trajectories.len().max(1) as f64,
        "expert trajectories generated"
    );
    Ok(trajectories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::tests::discrete_transition;
    use gymnasium::envs::{FrozenLake, MAP_4X4};

    #[test]
    fn deterministic_grid_expert_takes_the_shortest_path() {
        let mut env = FrozenLake::new(&["SF", "FG"], false).unwrap();
        let config = ExpertConfig {
            episodes: 3,
            ..Default::default()
        };

        let trajectories = expert_trajectories(&mut env, &config).unwrap();
        assert_eq!(trajectories.len(), 3);
        for traj in &trajectories {
            let first = discrete_transition(0, 1, 2);
            let mut second = discrete_transition(2, 2, 3);
            second.reward = 1.;
            second.done = true;
            assert_eq!(traj.transitions, vec![first, second]);
        }
    }

    #[test]
    fn slippery_expert_reaches_the_goal_often() {
        let mut env = FrozenLake::new(&MAP_4X4, true).unwrap();
        let config = ExpertConfig {
            episodes: 200,
            ..Default::default()
        };

        let trajectories = expert_trajectories(&mut env, &config).unwrap();
        let successes = trajectories.iter().filter(|t| t.total_reward() > 0.).count();
        // About 73% of episodes reach the goal within 100 steps.
        assert!(successes > 100, "{successes} / 200");
    }
}
