//! The adversarial epoch loop: generate rollouts, fit the discriminator,
//! improve the policy against the discriminator's reward.

use crate::discriminator::{
    discriminate, fit_discriminator, Discrimination, DiscriminatorConfig, TrainReward,
};
use crate::env_wrapper::RewardWrapper;
use crate::error::{AirlError, AirlResult};
use crate::features::TransitionSchema;
use crate::policy::PolicyOptimizer;
use crate::reward_net::RewardNet;
use crate::rollout::generate_trajectories;
use crate::trajectory::{LabeledDataset, Trajectory, Transition};
use gymnasium::Env;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Init,
    GeneratingRollouts,
    FittingDiscriminator,
    ImprovingPolicy,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Notified on every phase change of a trainer.
pub trait PhaseObserver {
    fn on_phase(&mut self, epoch: usize, phase: Phase);
}

impl<F: FnMut(usize, Phase)> PhaseObserver for F {
    fn on_phase(&mut self, epoch: usize, phase: Phase) {
        self(epoch, phase)
    }
}

/// Requests the trainer to stop at the next epoch boundary.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Generator episodes per epoch.
    pub generator_episodes: usize,
    pub max_episode_steps: usize,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            generator_episodes: 16,
            max_episode_steps: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub seed: u64,
    /// Policy optimizer iterations per epoch.
    pub policy_iterations: usize,
    pub rollout: RolloutConfig,
    pub discriminator: DiscriminatorConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            seed: 0,
            policy_iterations: 2,
            rollout: RolloutConfig::default(),
            discriminator: DiscriminatorConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> AirlResult<()> {
        if self.rollout.generator_episodes == 0 {
            return Err(AirlError::config(
                "trainer.rollout.generator_episodes",
                "must be at least 1",
            ));
        }
        if self.rollout.max_episode_steps == 0 {
            return Err(AirlError::config(
                "trainer.rollout.max_episode_steps",
                "must be at least 1",
            ));
        }
        let d = &self.discriminator;
        if !(d.learning_rate.is_finite() && d.learning_rate > 0.) {
            return Err(AirlError::config(
                "trainer.discriminator.learning_rate",
                format!("must be positive, got {}", d.learning_rate),
            ));
        }
        if !(d.l2_penalty.is_finite() && d.l2_penalty >= 0.) {
            return Err(AirlError::config(
                "trainer.discriminator.l2_penalty",
                format!("must be non-negative, got {}", d.l2_penalty),
            ));
        }
        Ok(())
    }
}

/// Per-run state threaded through the epochs: the transition schema and the
/// stream rollout seeds are drawn from.
#[derive(Debug)]
pub struct TrainingContext {
    pub schema: TransitionSchema,
    rng: StdRng,
}

impl TrainingContext {
    pub fn new(schema: TransitionSchema, seed: u64) -> Self {
        Self {
            schema,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub discriminator_loss_before: f64,
    pub discriminator_loss: f64,
    /// Mean `D` over expert transitions after the fit.
    pub expert_d: f64,
    /// Mean `D` over generator transitions after the fit.
    pub generator_d: f64,
    pub generator_transitions: usize,
    /// Mean native return of the generator episodes.
    pub generator_return: f64,
    /// Mean return under the training reward seen by the policy optimizer.
    pub train_reward_return: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs_completed: usize,
    pub stopped_early: bool,
    pub epochs: Vec<EpochStats>,
}

pub struct AirlTrainer<E: Env, P: PolicyOptimizer, R: RewardNet> {
    env: RewardWrapper<E>,
    expert: Vec<Trajectory>,
    policy: P,
    reward_net: R,
    config: TrainerConfig,
    context: TrainingContext,
    phase: Phase,
    epoch: usize,
    fitted: bool,
    stop: StopHandle,
    observer: Option<Box<dyn PhaseObserver>>,
}

impl<E, P, R> AirlTrainer<E, P, R>
where
    E: Env,
    P: PolicyOptimizer,
    R: RewardNet + Clone + 'static,
{
    pub fn new(
        env: E,
        expert: Vec<Trajectory>,
        policy: P,
        reward_net: R,
        config: TrainerConfig,
    ) -> AirlResult<Self> {
        config.validate()?;
        let schema = TransitionSchema::from_env(&env)?;

        if expert.iter().all(Trajectory::is_empty) {
            return Err(AirlError::Data("expert set has no transitions".into()));
        }
        for t in expert.iter().flat_map(Trajectory::iter) {
            // Mode mismatches are configuration errors, not bad data.
            reward_net.validate(t)?;
            schema.check(t).map_err(|e| {
                AirlError::Data(format!("expert transition does not match schema: {e}"))
            })?;
        }

        info!(
            env = %env.name(),
            expert_trajectories = expert.len(),
            mode = ?reward_net.mode(),
            gamma = reward_net.gamma(),
            "AIRL trainer ready"
        );

        Ok(Self {
            env: RewardWrapper::new(env),
            expert,
            policy,
            reward_net,
            context: TrainingContext::new(schema, config.seed),
            config,
            phase: Phase::Init,
            epoch: 0,
            fitted: false,
            stop: StopHandle::default(),
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: impl PhaseObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn epochs_completed(&self) -> usize {
        self.epoch
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn schema(&self) -> &TransitionSchema {
        &self.context.schema
    }

    pub fn expert(&self) -> &[Trajectory] {
        &self.expert
    }

    pub fn reward_net(&self) -> &R {
        &self.reward_net
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn into_parts(self) -> (E, P, R) {
        (self.env.into_inner(), self.policy, self.reward_net)
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!(epoch = self.epoch, from = %self.phase, to = %phase, "phase change");
        self.phase = phase;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_phase(self.epoch, phase);
        }
    }

    /// Runs the configured number of epochs.
    pub fn run(&mut self) -> AirlResult<TrainingReport> {
        self.train(self.config.epochs)
    }

    /// Runs up to `n_epochs` epochs, checking the stop handle between epochs.
    pub fn train(&mut self, n_epochs: usize) -> AirlResult<TrainingReport> {
        let mut report = TrainingReport::default();
        for _ in 0..n_epochs {
            if self.stop.is_stopped() {
                info!(epoch = self.epoch, "stop requested, ending training");
                report.stopped_early = true;
                break;
            }

            report.epochs.push(self.train_epoch()?);
            report.epochs_completed += 1;
        }

        self.set_phase(Phase::Done);
        Ok(report)
    }

    pub fn train_epoch(&mut self) -> AirlResult<EpochStats> {
        self.set_phase(Phase::GeneratingRollouts);
        self.env.unwrap_reward();
        let seed = self.context.next_seed();
        let policy = &mut self.policy;
        let generator = generate_trajectories(
            self.env.inner_mut(),
            self.config.rollout.generator_episodes,
            self.config.rollout.max_episode_steps,
            Some(seed),
            |s| policy.act(s).map(|(a, _)| a),
        )?;
        let generator_return =
            generator.iter().map(Trajectory::total_reward).sum::<f64>() / generator.len() as f64;

        self.set_phase(Phase::FittingDiscriminator);
        let dataset = LabeledDataset::build(&self.expert, &generator, &self.context.schema)?;
        let fit = fit_discriminator(
            &mut self.reward_net,
            &self.policy,
            &dataset,
            &self.config.discriminator,
        )?;
        self.fitted = true;
        let generator_transitions = dataset.n_generator();

        self.set_phase(Phase::ImprovingPolicy);
        self.env.wrap(Rc::new(TrainReward {
            reward_net: self.reward_net.clone(),
            policy: self.policy.frozen(),
        }));
        let improved = self
            .policy
            .improve(&mut self.env, self.config.policy_iterations);
        self.env.unwrap_reward();
        let improved = improved?;

        let stats = EpochStats {
            epoch: self.epoch,
            discriminator_loss_before: fit.loss_before,
            discriminator_loss: fit.loss,
            expert_d: fit.expert_d,
            generator_d: fit.generator_d,
            generator_transitions,
            generator_return,
            train_reward_return: improved.mean_return,
        };
        info!(
            epoch = stats.epoch,
            loss = stats.discriminator_loss,
            expert_d = stats.expert_d,
            generator_d = stats.generator_d,
            generator_return = stats.generator_return,
            "epoch finished"
        );

        self.epoch += 1;
        Ok(stats)
    }

    pub fn discriminate(&self, t: &Transition) -> AirlResult<Discrimination> {
        discriminate(&self.reward_net, &self.policy, t)
    }

    /// `log D − log(1 − D)` under the current reward network and policy.
    pub fn train_reward(&self, t: &Transition) -> AirlResult<f64> {
        Ok(self.discriminate(t)?.logit())
    }

    /// The recovered reward, free of the shaping term.
    pub fn unshaped_reward(&self) -> AirlResult<R::Unshaped> {
        if !self.fitted {
            return Err(AirlError::NotFitted);
        }
        Ok(self.reward_net.unshaped_reward())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyConfig, SoftmaxPolicy};
    use crate::reward_net::{LinearRewardNet, RewardMode};
    use crate::trajectory::tests::discrete_transition;
    use gymnasium::envs::FrozenLake;
    use std::cell::RefCell;

    type Trainer = AirlTrainer<FrozenLake, SoftmaxPolicy, LinearRewardNet>;

    fn expert() -> Vec<Trajectory> {
        vec![Trajectory::from_iter([
            discrete_transition(0, 1, 2),
            discrete_transition(2, 2, 3),
        ])]
    }

    fn config() -> TrainerConfig {
        TrainerConfig {
            rollout: RolloutConfig {
                generator_episodes: 4,
                max_episode_steps: 10,
            },
            policy_iterations: 1,
            ..Default::default()
        }
    }

    fn trainer(expert: Vec<Trajectory>, mode: RewardMode) -> AirlResult<Trainer> {
        let env = FrozenLake::new(&["SF", "FG"], false).unwrap();
        let schema = TransitionSchema::from_env(&env).unwrap();
        let policy = SoftmaxPolicy::new(
            &schema,
            PolicyConfig {
                episodes_per_iteration: 4,
                max_episode_steps: 10,
                ..Default::default()
            },
            1,
        )
        .unwrap();
        let net = LinearRewardNet::new(schema, mode, 0.9).unwrap();
        AirlTrainer::new(env, expert, policy, net, config())
    }

    #[test]
    fn phases_run_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut trainer = trainer(expert(), RewardMode::StateAction)
            .unwrap()
            .with_observer(move |epoch: usize, phase: Phase| {
                log.borrow_mut().push((epoch, phase))
            });
        assert_eq!(trainer.phase(), Phase::Init);

        let report = trainer.train(2).unwrap();
        assert_eq!(report.epochs_completed, 2);
        assert!(!report.stopped_early);
        assert_eq!(trainer.phase(), Phase::Done);

        use Phase::*;
        assert_eq!(
            *seen.borrow(),
            vec![
                (0, GeneratingRollouts),
                (0, FittingDiscriminator),
                (0, ImprovingPolicy),
                (1, GeneratingRollouts),
                (1, FittingDiscriminator),
                (1, ImprovingPolicy),
                (2, Done),
            ]
        );
    }

    #[test]
    fn stop_is_honored_between_epochs() {
        let mut trainer = trainer(expert(), RewardMode::StateOnly).unwrap();
        let stop = trainer.stop_handle();

        let report = trainer.train(1).unwrap();
        assert_eq!(report.epochs_completed, 1);

        stop.stop();
        let report = trainer.train(5).unwrap();
        assert_eq!(report.epochs_completed, 0);
        assert!(report.stopped_early);
        assert_eq!(trainer.epochs_completed(), 1);
    }

    #[test]
    fn stop_requested_mid_epoch_finishes_the_epoch() {
        let trainer = trainer(expert(), RewardMode::StateOnly).unwrap();
        let stop = trainer.stop_handle();
        let mut trainer = trainer.with_observer(move |_: usize, phase: Phase| {
            if phase == Phase::FittingDiscriminator {
                stop.stop();
            }
        });

        let report = trainer.train(3).unwrap();
        assert_eq!(report.epochs_completed, 1);
        assert!(report.stopped_early);
    }

    #[test]
    fn unshaped_reward_needs_a_fit() {
        let mut trainer = trainer(expert(), RewardMode::StateAction).unwrap();
        assert!(matches!(trainer.unshaped_reward(), Err(AirlError::NotFitted)));

        trainer.train(1).unwrap();
        let reward = trainer.unshaped_reward().unwrap();
        assert_eq!(reward.theta.len(), 16);
    }

    #[test]
    fn training_reward_is_logit_of_discriminator() {
        let mut trainer = trainer(expert(), RewardMode::StateAction).unwrap();
        trainer.train(1).unwrap();

        let t = discrete_transition(0, 1, 2);
        let disc = trainer.discriminate(&t).unwrap();
        let r = trainer.train_reward(&t).unwrap();
        assert!((r - (disc.log_d - disc.log_d_complement)).abs() < 1e-12);
        assert!((disc.d() + disc.d_complement() - 1.).abs() < 1e-12);
    }

    #[test]
    fn state_action_reward_without_actions_is_a_config_error() {
        let no_action = vec![Trajectory::from_iter([Transition::new(
            vec![gymnasium::ObsActSpaceItem::Discrete(0)],
            vec![],
            vec![gymnasium::ObsActSpaceItem::Discrete(2)],
        )])];

        let err = trainer(no_action.clone(), RewardMode::StateAction)
            .err()
            .unwrap();
        assert!(
            matches!(&err, AirlError::Config { param, .. } if param == "reward_net.mode"),
            "{err}"
        );

        // A state-only reward accepts the shape, the schema still rejects it.
        assert!(matches!(
            trainer(no_action, RewardMode::StateOnly),
            Err(AirlError::Data(_))
        ));
    }

    #[test]
    fn bad_inputs_are_rejected_up_front() {
        assert!(matches!(
            trainer(vec![Trajectory::default()], RewardMode::StateOnly),
            Err(AirlError::Data(_))
        ));

        let off_grid = vec![Trajectory::from_iter([discrete_transition(0, 1, 7)])];
        assert!(matches!(
            trainer(off_grid, RewardMode::StateOnly),
            Err(AirlError::Data(_))
        ));

        let env = FrozenLake::new(&["SF", "FG"], false).unwrap();
        let schema = TransitionSchema::from_env(&env).unwrap();
        let policy = SoftmaxPolicy::new(&schema, PolicyConfig::default(), 0).unwrap();
        let net = LinearRewardNet::new(schema, RewardMode::StateOnly, 0.9).unwrap();
        let config = TrainerConfig {
            rollout: RolloutConfig {
                generator_episodes: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            AirlTrainer::new(env, expert(), policy, net, config),
            Err(AirlError::Config { .. })
        ));
    }
}
