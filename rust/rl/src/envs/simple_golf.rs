use crate::mdps::Mdp;
use gymnasium::*;
use std::rc::Rc;

/// https://towardsdatascience.com/reinforcement-learning-an-easy-introduction-to-value-iteration-e4cfe0731fd5
pub struct SimpleGolf {
    gamma: f64,
    transitions: Rc<Transitions>,
}

fn t(next_state: Discrete, probability: f64, reward: f64, done: bool) -> Transition {
    Transition {
        next_state,
        probability,
        reward,
        done,
    }
}

impl SimpleGolf {
    /// States are fairway, green and in the hole.
    pub fn new(gamma: f64) -> Self {
        let transitions = Transitions::from([
            ((0, 0), vec![t(1, 0.9, 0., false), t(0, 0.1, 0., false)]),
            ((1, 1), vec![t(0, 0.9, 0., false), t(1, 0.1, 0., false)]),
            ((1, 2), vec![t(2, 0.9, 10., true), t(1, 0.1, 0., false)]),
        ]);

        Self {
            gamma,
            transitions: Rc::new(transitions),
        }
    }
}

impl Mdp for SimpleGolf {
    fn n_s(&self) -> usize {
        3
    }

    fn n_a(&self) -> usize {
        3
    }

    fn transitions(&self) -> Rc<Transitions> {
        Rc::clone(&self.transitions)
    }

    fn gamma(&self) -> f64 {
        self.gamma
    }
}
