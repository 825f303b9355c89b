use super::*;
use rand::distributions::WeightedIndex;

pub trait Policy {
    fn policy(&mut self, s: &[ObsActSpaceItem]) -> GymResult<Vec<ObsActSpaceItem>>;
}

/// Uniformly random actions from an action space.
pub struct RandomPolicy {
    pub act_space: ObsActSpace,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(act_space: ObsActSpace, seed: u64) -> Self {
        Self {
            act_space,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn policy(&mut self, _s: &[ObsActSpaceItem]) -> GymResult<Vec<ObsActSpaceItem>> {
        self.act_space.sample(&mut self.rng)
    }
}

pub trait Weighted {
    type S;

    fn s(&self) -> Self::S;

    fn p(&self) -> f64;
}

impl Weighted for Transition {
    type S = Discrete;

    fn s(&self) -> Discrete {
        self.next_state
    }

    fn p(&self) -> f64 {
        self.probability
    }
}

pub fn pick_next<'a, T: Weighted>(rng: &mut StdRng, ts: &'a [T]) -> GymResult<&'a T> {
    let dist = WeightedIndex::new(ts.iter().map(|item| item.p()))
        .map_err(|e| GymError::Protocol(format!("Cannot sample transition: {e}")))?;
    Ok(&ts[dist.sample(rng)])
}
