use crate::mdps::mdp::*;
use gymnasium::*;
use std::rc::Rc;

/// Evaluation sweeps per policy evaluation, in case `theta` is never reached.
const MAX_EVALUATION_SWEEPS: usize = 10_000;

/// Two actions whose values differ by less than this are tied.
const TIE_TOLERANCE: f64 = 1e-12;

/// Policy iteration - Sutton & Barto 2018, section 4.3.
/// Refer: http://incompleteideas.net/book/RLbook2020.pdf#page=102
#[derive(Clone)]
pub struct PolicyIteration {
    mdp: Rc<dyn Mdp>,
    transitions: Rc<Transitions>,
    v: Vec<f64>,
    pi: Vec<Discrete>,
}

impl PolicyIteration {
    pub fn new(mdp: Rc<dyn Mdp>, init_v: f64, init_a: Discrete) -> Self {
        let transitions = mdp.transitions();
        let n_s = mdp.n_s();

        Self {
            mdp,
            transitions,
            v: vec![init_v; n_s],
            pi: vec![init_a; n_s],
        }
    }

    fn q(&self, s: Discrete, a: Discrete) -> Option<f64> {
        let gamma = self.mdp.gamma();
        self.transitions.get(&(s, a)).map(|ts| {
            ts.iter()
                .map(|t| {
                    let next = if t.done { 0. } else { self.v[t.next_state as usize] };
                    t.probability * (t.reward + gamma * next)
                })
                .sum()
        })
    }

    /// In-place iterative policy evaluation of the current policy.
    fn evaluate(&mut self, theta: f64) -> usize {
        for sweep in 1..=MAX_EVALUATION_SWEEPS {
            let mut delta = 0f64;
            for s in 0..self.mdp.n_s() {
                let v = self.q(s as Discrete, self.pi[s]).unwrap_or(0.);
                delta = delta.max((v - self.v[s]).abs());
                self.v[s] = v;
            }

            if delta < theta {
                return sweep;
            }
        }

        tracing::warn!(
            sweeps = MAX_EVALUATION_SWEEPS,
            "policy evaluation did not converge"
        );
        MAX_EVALUATION_SWEEPS
    }

    /// Greedy improvement. Ties go to the current action, then to the lowest index.
    fn improve(&mut self) -> bool {
        let mut stable = true;
        for s in 0..self.mdp.n_s() {
            let Some((best_a, best_q)) = self.greedy(s as Discrete) else {
                continue;
            };

            let current = self.q(s as Discrete, self.pi[s]);
            if current.map_or(false, |q| q >= best_q - TIE_TOLERANCE) {
                continue;
            }

            self.pi[s] = best_a;
            stable = false;
        }

        stable
    }

    fn greedy(&self, s: Discrete) -> Option<(Discrete, f64)> {
        (0..self.mdp.n_a() as Discrete)
            .filter_map(|a| self.q(s, a).map(|q| (a, q)))
            .fold(None, |best, (a, q)| match best {
                Some((_, best_q)) if q <= best_q + TIE_TOLERANCE => best,
                _ => Some((a, q)),
            })
    }
}

impl MdpSolver<bool> for PolicyIteration {
    fn v_star(&self, s: Discrete) -> f64 {
        self.v[s as usize]
    }

    fn q_star(&self, s: Discrete, a: Discrete) -> Option<f64> {
        self.q(s, a)
    }

    /// `None` for states without any available action.
    fn pi_star(&self, s: Discrete) -> Option<Discrete> {
        self.greedy(s).map(|_| self.pi[s as usize])
    }

    /// Returns whether the policy is stable and the number of iterations run.
    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> (bool, usize) {
        let mut i = 0;
        loop {
            i += 1;
            let sweeps = self.evaluate(theta);
            let stable = self.improve();
            tracing::debug!(iteration = i, sweeps, stable, "policy iteration");

            if stable || num_iterations.map_or(false, |n| i >= n) {
                return (stable, i);
            }
        }
    }
}
