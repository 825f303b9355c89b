use crate::error::AirlResult;
use crate::trajectory::{Trajectory, Transition};
use gymnasium::{Env, ObsActSpaceItem};

/// Runs `act` in `env` for `n_episodes` episodes of at most `max_episode_steps` steps.
///
/// `seed` only seeds the first reset, so the batch as a whole is reproducible
/// while its episodes differ.
pub fn generate_trajectories<E, F>(
    env: &mut E,
    n_episodes: usize,
    max_episode_steps: usize,
    seed: Option<u64>,
    mut act: F,
) -> AirlResult<Vec<Trajectory>>
where
    E: Env + ?Sized,
    F: FnMut(&[ObsActSpaceItem]) -> AirlResult<Vec<ObsActSpaceItem>>,
{
    let mut trajectories = Vec::with_capacity(n_episodes);
    for episode in 0..n_episodes {
        let mut s = env.reset(if episode == 0 { seed } else { None })?;
        let mut transitions = Vec::new();
        for _ in 0..max_episode_steps {
            let a = act(&s)?;
            let si = env.step(&a)?;
            let done = si.done();
            transitions.push(Transition {
                state: s,
                action: a,
                next_state: si.observation.clone(),
                reward: si.reward,
                done,
            });
            s = si.observation;
            if done {
                break;
            }
        }

        tracing::trace!(episode, steps = transitions.len(), "rollout finished");
        trajectories.push(Trajectory { transitions });
    }

    Ok(trajectories)
}
