//! `airl`: recover a reward function from expert demonstrations.
//!
//! - `expert`  -- solve the environment with its true reward and save expert trajectories
//! - `train`   -- run AIRL against saved (or freshly planned) expert trajectories
//! - `inspect` -- print the recovered reward stored in a checkpoint

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use airl::checkpoint::{load_trajectories, save_trajectories, Checkpoint};
use airl::config::AirlConfig;
use airl::expert::expert_trajectories;
use airl::policy::SoftmaxPolicy;
use airl::reward_net::{BaseReward, LinearRewardNet, RewardMode};
use airl::trainer::AirlTrainer;
use airl::{ActionProbabilities, FeatureEncoder, TransitionSchema};
use gymnasium::ObsActSpaceItem;

#[derive(Parser)]
#[command(name = "airl", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan with the true reward and save expert trajectories.
    Expert {
        #[arg(long, default_value = "data/expert.json")]
        output: PathBuf,
    },

    /// Train a reward network and policy with AIRL.
    Train {
        /// Expert trajectories from `expert`; planned on the fly when omitted.
        #[arg(long)]
        expert: Option<PathBuf>,

        /// Overrides `trainer.epochs`.
        #[arg(long)]
        epochs: Option<usize>,

        #[arg(long, default_value = "data/checkpoint.json")]
        output: PathBuf,
    },

    /// Print the recovered reward of a checkpoint.
    Inspect {
        #[arg(default_value = "data/checkpoint.json")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AirlConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AirlConfig::default(),
    };

    match cli.command {
        Commands::Expert { output } => cmd_expert(&config, &output),
        Commands::Train {
            expert,
            epochs,
            output,
        } => cmd_train(&config, expert.as_deref(), epochs, &output),
        Commands::Inspect { path } => cmd_inspect(&path),
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn cmd_expert(config: &AirlConfig, output: &Path) -> Result<()> {
    let mut env = config.env.make_env()?;
    let trajectories = expert_trajectories(&mut env, &config.expert)?;

    create_parent(output)?;
    save_trajectories(output, &trajectories)
        .with_context(|| format!("Failed to save trajectories to {}", output.display()))?;
    tracing::info!(
        episodes = trajectories.len(),
        path = %output.display(),
        "expert trajectories saved"
    );
    Ok(())
}

fn cmd_train(
    config: &AirlConfig,
    expert: Option<&Path>,
    epochs: Option<usize>,
    output: &Path,
) -> Result<()> {
    let mut env = config.env.make_env()?;
    let expert = match expert {
        Some(path) => load_trajectories(path).with_context(|| {
            format!("Failed to load expert trajectories from {}", path.display())
        })?,
        None => expert_trajectories(&mut env, &config.expert)?,
    };

    let schema = TransitionSchema::from_env(&env)?;
    let policy = SoftmaxPolicy::new(&schema, config.policy.clone(), config.trainer.seed)?;
    let reward_net =
        LinearRewardNet::new(schema, config.reward_net.mode, config.reward_net.gamma)?;
    let mut trainer = AirlTrainer::new(env, expert, policy, reward_net, config.trainer.clone())?;

    if let Some(secs) = config.max_wall_secs {
        let stop = trainer.stop_handle();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            tracing::warn!(secs, "wall-clock budget exhausted, stopping after this epoch");
            stop.stop();
        });
    }

    let report = trainer.train(epochs.unwrap_or(config.trainer.epochs))?;
    if let Some(last) = report.epochs.last() {
        tracing::info!(
            epochs = report.epochs_completed,
            stopped_early = report.stopped_early,
            expert_d = last.expert_d,
            generator_d = last.generator_d,
            "training finished"
        );
    }

    let checkpoint = Checkpoint::new(
        trainer.reward_net(),
        Some(trainer.policy().params()),
        report,
    );
    create_parent(output)?;
    checkpoint
        .save(output)
        .with_context(|| format!("Failed to save checkpoint to {}", output.display()))?;
    tracing::info!(path = %output.display(), "checkpoint saved");
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let checkpoint = Checkpoint::load(path)
        .with_context(|| format!("Failed to load checkpoint from {}", path.display()))?;
    let reward = &checkpoint.reward;

    let (FeatureEncoder::OneHot { n: n_s }, FeatureEncoder::OneHot { n: n_a }) =
        (reward.schema.state, reward.schema.action)
    else {
        println!("theta = {}", reward.theta);
        println!("bias  = {}", reward.bias);
        return Ok(());
    };
    if n_s == 0 || n_a == 0 {
        bail!("checkpoint has an empty state or action space");
    }

    println!(
        "{} epochs{}, gamma = {}",
        checkpoint.report.epochs_completed,
        if checkpoint.report.stopped_early { " (stopped early)" } else { "" },
        checkpoint.gamma
    );
    let r_label = match reward.mode {
        RewardMode::StateOnly => "r(s)",
        RewardMode::StateAction => "max r(s,a)",
    };
    println!("{:>6} {:>12} {:>6}", "state", r_label, "pi(s)");
    for s in 0..n_s {
        let state = [ObsActSpaceItem::Discrete(s as i32)];
        let r = match reward.mode {
            RewardMode::StateOnly => reward.evaluate(&state, &[])?,
            RewardMode::StateAction => (0..n_a)
                .map(|a| reward.evaluate(&state, &[ObsActSpaceItem::Discrete(a as i32)]))
                .collect::<airl::AirlResult<Vec<_>>>()?
                .into_iter()
                .fold(f64::NEG_INFINITY, f64::max),
        };

        let greedy = match &checkpoint.policy {
            Some(policy) => {
                let probs = (0..n_a)
                    .map(|a| {
                        policy.action_probability(&state, &[ObsActSpaceItem::Discrete(a as i32)])
                    })
                    .collect::<airl::AirlResult<Vec<_>>>()?;
                let (a, _) = probs.iter().enumerate().fold(
                    (0, f64::NEG_INFINITY),
                    |best, (a, &p)| if p > best.1 { (a, p) } else { best },
                );
                a.to_string()
            }
            None => "-".to_string(),
        };
        println!("{s:>6} {r:>12.4} {greedy:>6}");
    }
    Ok(())
}
