use crate::discriminator::TransitionReward;
use crate::trajectory::Transition;
use gymnasium::{Env, GymError, GymResult, ObsActSpace, ObsActSpaceItem, StepInfo};
use std::rc::Rc;

/// Substitutes `reward(o_{k-1}, a_k, o_k)` for the native reward of `env`.
///
/// The native environment is owned exactly once; installing another reward
/// only replaces the reward, so repeated wraps never stack.
pub struct RewardWrapper<E: Env> {
    env: E,
    reward: Option<Rc<dyn TransitionReward>>,
    previous_observation: Option<Vec<ObsActSpaceItem>>,
}

impl<E: Env> RewardWrapper<E> {
    /// Passes the native reward through until a reward is installed.
    pub fn new(env: E) -> Self {
        Self {
            env,
            reward: None,
            previous_observation: None,
        }
    }

    pub fn wrap(&mut self, reward: Rc<dyn TransitionReward>) {
        self.reward = Some(reward);
    }

    pub fn unwrap_reward(&mut self) -> Option<Rc<dyn TransitionReward>> {
        self.reward.take()
    }

    pub fn is_wrapped(&self) -> bool {
        self.reward.is_some()
    }

    pub fn inner(&self) -> &E {
        &self.env
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn into_inner(self) -> E {
        self.env
    }
}

impl<E: Env> Env for RewardWrapper<E> {
    fn name(&self) -> String {
        self.env.name()
    }

    fn observation_space(&self) -> &ObsActSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> &ObsActSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> GymResult<Vec<ObsActSpaceItem>> {
        let obs = self.env.reset(seed)?;
        self.previous_observation = Some(obs.clone());
        Ok(obs)
    }

    fn step(&mut self, action: &[ObsActSpaceItem]) -> GymResult<StepInfo> {
        let previous = self.previous_observation.as_ref().ok_or(GymError::NotReset)?;
        let mut si = self.env.step(action)?;

        if let Some(reward) = &self.reward {
            let t = Transition {
                state: previous.clone(),
                action: action.to_vec(),
                next_state: si.observation.clone(),
                reward: si.reward,
                done: si.done(),
            };
            si.reward = reward
                .reward(&t)
                .map_err(|e| GymError::Reward(e.to_string()))?;
        }

        self.previous_observation = Some(si.observation.clone());
        Ok(si)
    }
}
