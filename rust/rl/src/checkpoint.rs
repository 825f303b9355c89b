//! JSON persistence of trained parameters and expert trajectory sets.

use crate::error::AirlResult;
use crate::policy::SoftmaxParams;
use crate::reward_net::{LinearReward, LinearRewardNet, LinearShaping, RewardNet};
use crate::trainer::TrainingReport;
use crate::trajectory::Trajectory;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The recovered, unshaped reward.
    pub reward: LinearReward,
    pub shaping: LinearShaping,
    pub gamma: f64,
    pub policy: Option<SoftmaxParams>,
    pub report: TrainingReport,
}

impl Checkpoint {
    pub fn new(
        reward_net: &LinearRewardNet,
        policy: Option<&SoftmaxParams>,
        report: TrainingReport,
    ) -> Self {
        Self {
            reward: reward_net.unshaped_reward(),
            shaping: reward_net.shaping().clone(),
            gamma: reward_net.gamma(),
            policy: policy.cloned(),
            report,
        }
    }

    /// Rebuilds the full reward network, shaping included.
    pub fn reward_net(&self) -> AirlResult<LinearRewardNet> {
        LinearRewardNet::from_parts(self.reward.clone(), self.shaping.clone(), self.gamma)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> AirlResult<()> {
        write_json(path, self)
    }

    pub fn load(path: impl AsRef<Path>) -> AirlResult<Self> {
        let checkpoint: Self = read_json(path)?;
        checkpoint.reward_net()?;
        Ok(checkpoint)
    }
}

pub fn save_trajectories(path: impl AsRef<Path>, trajectories: &[Trajectory]) -> AirlResult<()> {
    write_json(path, &trajectories)
}

pub fn load_trajectories(path: impl AsRef<Path>) -> AirlResult<Vec<Trajectory>> {
    read_json(path)
}

fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> AirlResult<()> {
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut w, value)?;
    w.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> AirlResult<T> {
    let r = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(r)?)
}
