use crate::error::{AirlError, AirlResult};
use crate::mdps::Mdp;
use gymnasium::*;
use std::rc::Rc;

/// Views an environment that exposes its dynamics as an [`Mdp`].
pub struct GymAdapter {
    name: String,
    n_s: usize,
    n_a: usize,
    gamma: f64,
    transitions: Rc<Transitions>,
}

impl GymAdapter {
    pub fn new<E: Env + TabularModel + ?Sized>(env: &E, gamma: f64) -> AirlResult<Self> {
        let name = env.name();
        let (ObsActSpace::Discrete { n: n_s }, ObsActSpace::Discrete { n: n_a }) =
            (env.observation_space(), env.action_space())
        else {
            return Err(AirlError::config(
                "env",
                format!("'{name}' is not an MDP: spaces must be Discrete"),
            ));
        };

        Ok(Self {
            n_s: *n_s as usize,
            n_a: *n_a as usize,
            transitions: env.transitions()?,
            name,
            gamma,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Mdp for GymAdapter {
    fn n_s(&self) -> usize {
        self.n_s
    }

    fn n_a(&self) -> usize {
        self.n_a
    }

    fn transitions(&self) -> Rc<Transitions> {
        Rc::clone(&self.transitions)
    }

    fn gamma(&self) -> f64 {
        self.gamma
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymnasium::envs::{FrozenLake, MAP_8X8};

    #[test]
    fn frozen_lake_is_an_mdp() {
        let env = FrozenLake::new(&MAP_8X8, true).unwrap();
        let mdp = GymAdapter::new(&env, 0.95).unwrap();
        assert_eq!(mdp.name(), "FrozenLake-v1");
        assert_eq!((mdp.n_s(), mdp.n_a()), (64, 4));
        assert_eq!(mdp.transitions().len(), 256);
        assert_eq!(mdp.gamma(), 0.95);
    }
}
