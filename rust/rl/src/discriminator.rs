//! The discriminator `D = exp(f) / (exp(f) + π(a|s))`, derived from a reward
//! network and the current policy, and its logistic-regression fit.

use crate::error::{AirlError, AirlResult};
use crate::policy::ActionProbabilities;
use crate::reward_net::RewardNet;
use crate::trajectory::{Label, LabeledDataset, Transition};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Floor applied to `π(a|s)` before taking logs.
pub const MIN_ACTION_PROBABILITY: f64 = 1e-12;

/// `ln(exp(a) + exp(b))` without overflow.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + (-(a - b).abs()).exp().ln_1p()
}

/// Log-space discriminator outputs for one transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discrimination {
    pub shaped_reward: f64,
    pub log_d: f64,
    pub log_d_complement: f64,
}

impl Discrimination {
    pub fn new(shaped_reward: f64, action_probability: f64) -> AirlResult<Self> {
        if !shaped_reward.is_finite() {
            return Err(AirlError::Numerical(format!(
                "shaped reward is {shaped_reward}"
            )));
        }
        if !(0. ..=1.).contains(&action_probability) {
            return Err(AirlError::Numerical(format!(
                "action probability {action_probability} is not in [0, 1]"
            )));
        }

        let log_pi = action_probability.max(MIN_ACTION_PROBABILITY).ln();
        let log_z = log_add_exp(shaped_reward, log_pi);
        Ok(Self {
            shaped_reward,
            log_d: shaped_reward - log_z,
            log_d_complement: log_pi - log_z,
        })
    }

    pub fn d(&self) -> f64 {
        self.log_d.exp()
    }

    pub fn d_complement(&self) -> f64 {
        self.log_d_complement.exp()
    }

    /// `log D − log(1 − D)`, the policy's training reward.
    pub fn logit(&self) -> f64 {
        self.log_d - self.log_d_complement
    }
}

pub fn discriminate<R, P>(reward_net: &R, policy: &P, t: &Transition) -> AirlResult<Discrimination>
where
    R: RewardNet + ?Sized,
    P: ActionProbabilities + ?Sized,
{
    let f = reward_net.evaluate_shaped(t)?;
    let pi = policy.action_probability(&t.state, &t.action)?;
    Discrimination::new(f, pi)
}

/// A per-transition reward signal substituted for an environment's own.
pub trait TransitionReward {
    fn reward(&self, t: &Transition) -> AirlResult<f64>;
}

impl<F> TransitionReward for F
where
    F: Fn(&Transition) -> AirlResult<f64>,
{
    fn reward(&self, t: &Transition) -> AirlResult<f64> {
        self(t)
    }
}

/// `log D − log(1 − D)` for a frozen reward network and policy.
pub struct TrainReward<R> {
    pub reward_net: R,
    pub policy: Rc<dyn ActionProbabilities>,
}

impl<R: RewardNet> TrainReward<R> {
    pub fn discriminate(&self, t: &Transition) -> AirlResult<Discrimination> {
        discriminate(&self.reward_net, self.policy.as_ref(), t)
    }
}

impl<R: RewardNet> TransitionReward for TrainReward<R> {
    fn reward(&self, t: &Transition) -> AirlResult<f64> {
        Ok(self.discriminate(t)?.logit())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscriminatorConfig {
    pub learning_rate: f64,
    pub steps_per_epoch: usize,
    pub l2_penalty: f64,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            steps_per_epoch: 10,
            l2_penalty: 0.,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitStats {
    /// Class-balanced log-loss before the first step.
    pub loss_before: f64,
    /// Class-balanced log-loss after the last step.
    pub loss: f64,
    pub expert_d: f64,
    pub generator_d: f64,
}

struct Evaluation {
    loss: f64,
    expert_d: f64,
    generator_d: f64,
    grads: Vec<f64>,
}

fn evaluate<R, P>(reward_net: &R, policy: &P, dataset: &LabeledDataset) -> AirlResult<Evaluation>
where
    R: RewardNet + ?Sized,
    P: ActionProbabilities + ?Sized,
{
    let mut eval = Evaluation {
        loss: 0.,
        expert_d: 0.,
        generator_d: 0.,
        grads: Vec::with_capacity(dataset.len()),
    };

    for sample in dataset.samples() {
        let disc = discriminate(reward_net, policy, sample.transition)?;
        let w = dataset.class_weight(sample.label);
        let d = disc.d();
        match sample.label {
            Label::Expert => {
                eval.loss -= w * disc.log_d;
                eval.expert_d += 2. * w * d;
            }
            Label::Generator => {
                eval.loss -= w * disc.log_d_complement;
                eval.generator_d += 2. * w * d;
            }
        }
        eval.grads.push(w * (d - sample.label.target()));
    }

    if !eval.loss.is_finite() {
        return Err(AirlError::Numerical(format!(
            "discriminator loss is {}",
            eval.loss
        )));
    }

    Ok(eval)
}

/// Full-batch gradient descent on the class-balanced binary cross-entropy of
/// `D` against `(θ, φ)`, expert samples labeled 1 and generator samples 0.
pub fn fit_discriminator<R, P>(
    reward_net: &mut R,
    policy: &P,
    dataset: &LabeledDataset,
    config: &DiscriminatorConfig,
) -> AirlResult<FitStats>
where
    R: RewardNet + ?Sized,
    P: ActionProbabilities + ?Sized,
{
    let mut eval = evaluate(reward_net, policy, dataset)?;
    let loss_before = eval.loss;

    for step in 0..config.steps_per_epoch {
        let grads = dataset
            .samples()
            .iter()
            .zip(eval.grads.iter())
            .map(|(s, &g)| (s.transition, g))
            .collect::<Vec<_>>();
        reward_net.fit_step(&grads, config.learning_rate, config.l2_penalty)?;

        eval = evaluate(reward_net, policy, dataset)?;
        tracing::trace!(step, loss = eval.loss, "discriminator step");
    }

    Ok(FitStats {
        loss_before,
        loss: eval.loss,
        expert_d: eval.expert_d,
        generator_d: eval.generator_d,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::TransitionSchema;
    use crate::reward_net::{LinearRewardNet, RewardMode};
    use crate::trajectory::tests::discrete_transition;
    use crate::trajectory::Trajectory;
    use float_eq::*;
    use gymnasium::{ObsActSpace, ObsActSpaceItem};
    use ndarray::array;
    use rstest::rstest;

    struct Uniform(f64);

    impl ActionProbabilities for Uniform {
        fn action_probability(
            &self,
            _state: &[ObsActSpaceItem],
            _action: &[ObsActSpaceItem],
        ) -> AirlResult<f64> {
            Ok(self.0)
        }
    }

    fn net(mode: RewardMode) -> LinearRewardNet {
        let schema =
            TransitionSchema::new(&ObsActSpace::Discrete { n: 4 }, &ObsActSpace::Discrete { n: 4 })
                .unwrap();
        LinearRewardNet::new(schema, mode, 0.9).unwrap()
    }

    #[rstest]
    #[case(0., 0.25)]
    #[case(-800., 0.5)]
    #[case(800., 0.5)]
    #[case(3.5, 1.)]
    #[case(-3.5, 0.)]
    #[case(1e-9, 1e-300)]
    fn d_and_complement_sum_to_one(#[case] f: f64, #[case] pi: f64) {
        let disc = Discrimination::new(f, pi).unwrap();
        assert!(disc.log_d <= 0. && disc.log_d_complement <= 0.);
        assert_float_eq!(disc.d() + disc.d_complement(), 1., abs <= 1e-12);
    }

    #[test]
    fn logit_is_shaped_reward_minus_log_pi() {
        let disc = Discrimination::new(0.7, 0.2).unwrap();
        assert_float_eq!(disc.logit(), 0.7 - 0.2f64.ln(), abs <= 1e-12);

        let floored = Discrimination::new(0.7, 0.).unwrap();
        assert_float_eq!(
            floored.logit(),
            0.7 - MIN_ACTION_PROBABILITY.ln(),
            abs <= 1e-9
        );
    }

    #[rstest]
    #[case(f64::NAN, 0.5)]
    #[case(f64::INFINITY, 0.5)]
    #[case(0., f64::NAN)]
    #[case(0., 1.5)]
    #[case(0., -0.1)]
    fn non_finite_inputs_are_numerical_errors(#[case] f: f64, #[case] pi: f64) {
        assert!(matches!(
            Discrimination::new(f, pi),
            Err(AirlError::Numerical(_))
        ));
    }

    #[test]
    fn log_add_exp_is_stable() {
        assert_float_eq!(log_add_exp(1000., 1000.), 1000. + 2f64.ln(), abs <= 1e-9);
        assert_float_eq!(log_add_exp(-1000., -1000.), -1000. + 2f64.ln(), abs <= 1e-9);
        assert_float_eq!(log_add_exp(0., -1000.), 0., abs <= 1e-300);
        assert_float_eq!(log_add_exp(2., 3.), (2f64.exp() + 3f64.exp()).ln(), abs <= 1e-12);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, -3.), -3.);
    }

    #[test]
    fn discriminate_uses_shaped_reward_and_policy() {
        let mut net = net(RewardMode::StateOnly);
        net.set_base(array![0., 0., 1., 0.], 0.).unwrap();
        let t = discrete_transition(2, 1, 3);

        let disc = discriminate(&net, &Uniform(0.25), &t).unwrap();
        assert_float_eq!(disc.shaped_reward, 1., abs <= 1e-12);
        assert_float_eq!(disc.d(), 1f64.exp() / (1f64.exp() + 0.25), abs <= 1e-12);

        let train_reward = TrainReward {
            reward_net: net,
            policy: Rc::new(Uniform(0.25)),
        };
        assert_float_eq!(
            train_reward.reward(&t).unwrap(),
            1. - 0.25f64.ln(),
            abs <= 1e-12
        );
    }

    #[test]
    fn closures_are_transition_rewards() {
        let r = |t: &Transition| Ok(t.reward * 2.);
        let mut t = discrete_transition(0, 0, 1);
        t.reward = 1.5;
        assert_eq!(r.reward(&t).unwrap(), 3.);
    }

    #[test]
    fn fitting_lowers_the_loss_and_separates_the_classes() {
        let expert = vec![Trajectory::from_iter([
            discrete_transition(0, 1, 2),
            discrete_transition(2, 2, 3),
        ])];
        let generator = vec![
            Trajectory::from_iter([discrete_transition(0, 0, 0), discrete_transition(0, 3, 0)]),
            Trajectory::from_iter([discrete_transition(0, 2, 1), discrete_transition(1, 0, 0)]),
            Trajectory::from_iter([discrete_transition(0, 1, 2), discrete_transition(2, 3, 0)]),
        ];
        let mut net = net(RewardMode::StateAction);
        let schema = *net.schema();
        let dataset = LabeledDataset::build(&expert, &generator, &schema).unwrap();

        let one_step = DiscriminatorConfig {
            learning_rate: 0.5,
            steps_per_epoch: 1,
            l2_penalty: 0.,
        };
        let stats = fit_discriminator(&mut net, &Uniform(0.25), &dataset, &one_step).unwrap();
        assert!(stats.loss < stats.loss_before, "{stats:?}");
        // Zero parameters: D = 1 / (1 + 0.25) everywhere, loss = −½·ln(0.8) − ½·ln(0.2).
        assert_float_eq!(
            stats.loss_before,
            -0.5 * 0.8f64.ln() - 0.5 * 0.2f64.ln(),
            abs <= 1e-12
        );

        let stats = fit_discriminator(
            &mut net,
            &Uniform(0.25),
            &dataset,
            &DiscriminatorConfig {
                steps_per_epoch: 50,
                ..one_step
            },
        )
        .unwrap();
        assert!(stats.expert_d > 0.5, "{stats:?}");
        assert!(stats.generator_d < 0.5, "{stats:?}");
    }

    #[test]
    fn empty_steps_only_evaluate() {
        let expert = vec![Trajectory::from_iter([discrete_transition(0, 1, 2)])];
        let generator = vec![Trajectory::from_iter([discrete_transition(0, 0, 0)])];
        let mut net = net(RewardMode::StateOnly);
        let schema = *net.schema();
        let dataset = LabeledDataset::build(&expert, &generator, &schema).unwrap();

        let config = DiscriminatorConfig {
            steps_per_epoch: 0,
            ..Default::default()
        };
        let stats = fit_discriminator(&mut net, &Uniform(0.5), &dataset, &config).unwrap();
        assert_eq!(stats.loss, stats.loss_before);
        assert_eq!(net.reward().theta, array![0., 0., 0., 0.]);
    }
}
