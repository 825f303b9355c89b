use super::mdp::*;
use gymnasium::{mdps::*, *};
use std::rc::Rc;

/// Acts greedily with respect to a solved MDP.
pub struct MdpSolverPolicy<T> {
    pub mdp_solver: Rc<dyn MdpSolver<T>>,
}

impl<T> MdpSolverPolicy<T> {
    pub fn new(mdp_solver: Rc<dyn MdpSolver<T>>) -> Self {
        Self { mdp_solver }
    }
}

impl<T> Policy for MdpSolverPolicy<T> {
    fn policy(&mut self, s: &[ObsActSpaceItem]) -> GymResult<Vec<ObsActSpaceItem>> {
        let [ObsActSpaceItem::Discrete(s)] = s else {
            return Err(GymError::Protocol(format!(
                "Observation state should be a single discrete item, got {s:?}."
            )));
        };

        let a = self
            .mdp_solver
            .pi_star(*s)
            .ok_or_else(|| GymError::Protocol(format!("No action available in state {s}.")))?;
        Ok(vec![ObsActSpaceItem::Discrete(a)])
    }
}
