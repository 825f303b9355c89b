use gymnasium::*;
use std::rc::Rc;

/// Markov Decision Process - Sutton & Barto 2018.
pub trait Mdp {
    fn n_s(&self) -> usize;

    fn n_a(&self) -> usize;

    /// Missing `(s, a)` keys mark actions that are unavailable in `s`.
    fn transitions(&self) -> Rc<Transitions>;

    // TODO: Gamma should not be here.
    fn gamma(&self) -> f64;
}

pub trait MdpSolver<T> {
    fn v_star(&self, s: Discrete) -> f64;

    fn q_star(&self, s: Discrete, a: Discrete) -> Option<f64>;

    fn pi_star(&self, s: Discrete) -> Option<Discrete>;

    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> (T, usize);
}
