pub mod mdp;
pub mod mdp_solver_policy;
pub mod solvers;

pub use mdp::*;
pub use mdp_solver_policy::*;
pub use solvers::policy_iteration::*;
