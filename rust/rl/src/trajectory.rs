//! Transition and trajectory data, and the labeled dataset the discriminator is fitted on.

use crate::error::{AirlError, AirlResult};
use crate::features::TransitionSchema;
use gymnasium::ObsActSpaceItem;
use serde::{Deserialize, Serialize};

/// One `(s, a, s')` step of an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Vec<ObsActSpaceItem>,
    pub action: Vec<ObsActSpaceItem>,
    pub next_state: Vec<ObsActSpaceItem>,
    /// Reward the environment reported for this step.
    pub reward: f64,
    pub done: bool,
}

impl Transition {
    pub fn new(
        state: Vec<ObsActSpaceItem>,
        action: Vec<ObsActSpaceItem>,
        next_state: Vec<ObsActSpaceItem>,
    ) -> Self {
        Self {
            state,
            action,
            next_state,
            reward: 0.,
            done: false,
        }
    }
}

/// Transitions of a single episode, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub transitions: Vec<Transition>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Undiscounted sum of the recorded rewards.
    pub fn total_reward(&self) -> f64 {
        self.transitions.iter().map(|t| t.reward).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transition> {
        self.transitions.iter()
    }
}

impl FromIterator<Transition> for Trajectory {
    fn from_iter<I: IntoIterator<Item = Transition>>(iter: I) -> Self {
        Self {
            transitions: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Expert,
    Generator,
}

impl Label {
    /// Binary target of the logistic regression.
    pub fn target(self) -> f64 {
        match self {
            Label::Expert => 1.,
            Label::Generator => 0.,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LabeledTransition<'a> {
    pub transition: &'a Transition,
    pub label: Label,
}

/// Expert (label 1) and generator (label 0) transitions of one epoch.
#[derive(Debug, Clone)]
pub struct LabeledDataset<'a> {
    samples: Vec<LabeledTransition<'a>>,
    n_expert: usize,
    n_generator: usize,
}

impl<'a> LabeledDataset<'a> {
    pub fn build(
        expert: &'a [Trajectory],
        generator: &'a [Trajectory],
        schema: &TransitionSchema,
    ) -> AirlResult<Self> {
        let mut samples = Vec::new();
        for (trajectories, label) in [(expert, Label::Expert), (generator, Label::Generator)] {
            for t in trajectories.iter().flat_map(Trajectory::iter) {
                schema.check(t).map_err(|e| {
                    AirlError::Data(format!("{label:?} transition does not match schema: {e}"))
                })?;
                samples.push(LabeledTransition {
                    transition: t,
                    label,
                });
            }
        }

        let n_expert = samples.iter().filter(|s| s.label == Label::Expert).count();
        let n_generator = samples.len() - n_expert;
        if n_expert == 0 {
            return Err(AirlError::Data("expert batch has no transitions".into()));
        }
        if n_generator == 0 {
            return Err(AirlError::Data("generator batch has no transitions".into()));
        }

        Ok(Self {
            samples,
            n_expert,
            n_generator,
        })
    }

    pub fn samples(&self) -> &[LabeledTransition<'a>] {
        &self.samples
    }

    pub fn n_expert(&self) -> usize {
        self.n_expert
    }

    pub fn n_generator(&self) -> usize {
        self.n_generator
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Per-sample weight giving each class half of the total mass.
    pub fn class_weight(&self, label: Label) -> f64 {
        match label {
            Label::Expert => 0.5 / self.n_expert as f64,
            Label::Generator => 0.5 / self.n_generator as f64,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use gymnasium::{Discrete, ObsActSpace};

    pub(crate) fn discrete_transition(s: Discrete, a: Discrete, s_prime: Discrete) -> Transition {
        Transition::new(
            vec![ObsActSpaceItem::Discrete(s)],
            vec![ObsActSpaceItem::Discrete(a)],
            vec![ObsActSpaceItem::Discrete(s_prime)],
        )
    }

    fn schema() -> TransitionSchema {
        TransitionSchema::new(
            &ObsActSpace::Discrete { n: 4 },
            &ObsActSpace::Discrete { n: 4 },
        )
        .unwrap()
    }

    #[test]
    fn dataset_labels_and_weights() {
        let expert = vec![Trajectory::from_iter([
            discrete_transition(0, 1, 2),
            discrete_transition(2, 2, 3),
        ])];
        let generator = vec![
            Trajectory::from_iter([discrete_transition(0, 0, 0)]),
            Trajectory::from_iter([
                discrete_transition(0, 2, 1),
                discrete_transition(1, 1, 3),
                discrete_transition(3, 0, 3),
            ]),
        ];

        let ds = LabeledDataset::build(&expert, &generator, &schema()).unwrap();
        assert_eq!(ds.len(), 6);
        assert_eq!(ds.n_expert(), 2);
        assert_eq!(ds.n_generator(), 4);
        assert_eq!(ds.samples()[0].label, Label::Expert);
        assert_eq!(ds.samples()[5].label, Label::Generator);

        let total = ds
            .samples()
            .iter()
            .map(|s| ds.class_weight(s.label))
            .sum::<f64>();
        assert!((total - 1.).abs() < 1e-12);
    }

    #[test]
    fn empty_batches_are_data_errors() {
        let some = vec![Trajectory::from_iter([discrete_transition(0, 1, 2)])];
        let none = vec![Trajectory::default()];

        assert!(matches!(
            LabeledDataset::build(&none, &some, &schema()),
            Err(AirlError::Data(_))
        ));
        assert!(matches!(
            LabeledDataset::build(&some, &[], &schema()),
            Err(AirlError::Data(_))
        ));
    }

    #[test]
    fn mismatched_schema_is_a_data_error() {
        let expert = vec![Trajectory::from_iter([discrete_transition(0, 1, 2)])];
        let generator = vec![Trajectory::from_iter([Transition::new(
            vec![ObsActSpaceItem::Continous(0.5)],
            vec![ObsActSpaceItem::Discrete(1)],
            vec![ObsActSpaceItem::Discrete(2)],
        )])];

        let err = LabeledDataset::build(&expert, &generator, &schema()).unwrap_err();
        assert!(matches!(err, AirlError::Data(_)), "{err}");
    }

    #[test]
    fn trajectory_total_reward() {
        let mut t = discrete_transition(2, 2, 3);
        t.reward = 1.;
        let traj = Trajectory::from_iter([discrete_transition(0, 1, 2), t]);
        assert_eq!(traj.len(), 2);
        assert_eq!(traj.total_reward(), 1.);
    }
}
