//! Dense encodings of observation and action items.

use crate::error::{AirlError, AirlResult};
use crate::trajectory::Transition;
use gymnasium::{Env, ObsActSpace, ObsActSpaceItem};
use itertools::iproduct;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Maps the items of one space to a fixed-width feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureEncoder {
    /// `Discrete { n }` spaces, one-hot of width `n`.
    OneHot { n: usize },
    /// `Box` spaces, the raw values.
    Dense { dim: usize },
}

impl FeatureEncoder {
    pub fn for_space(space: &ObsActSpace) -> AirlResult<Self> {
        match space {
            ObsActSpace::Discrete { n } if *n > 0 => Ok(Self::OneHot { n: *n as usize }),
            ObsActSpace::Discrete { n } => Err(AirlError::config(
                "space",
                format!("Discrete space of size {n} has no elements"),
            )),
            ObsActSpace::Box { .. } => Ok(Self::Dense {
                dim: space.flat_len(),
            }),
            ObsActSpace::Tuple { .. } => {
                Err(AirlError::config("space", "Tuple spaces are not supported"))
            }
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::OneHot { n } => *n,
            Self::Dense { dim } => *dim,
        }
    }

    pub fn encode(&self, items: &[ObsActSpaceItem]) -> AirlResult<Array1<f64>> {
        match self {
            Self::OneHot { n } => match items {
                [ObsActSpaceItem::Discrete(i)] if *i >= 0 && (*i as usize) < *n => {
                    let mut x = Array1::zeros(*n);
                    x[*i as usize] = 1.;
                    Ok(x)
                }
                _ => Err(AirlError::config(
                    "items",
                    format!("{items:?} is not a single discrete index below {n}"),
                )),
            },
            Self::Dense { dim } => {
                if items.len() != *dim {
                    return Err(AirlError::config(
                        "items",
                        format!("expected {dim} continuous values, got {}", items.len()),
                    ));
                }
                items
                    .iter()
                    .map(|item| {
                        item.box_value().ok_or_else(|| {
                            AirlError::config("items", format!("{item:?} is not continuous"))
                        })
                    })
                    .collect::<AirlResult<Vec<_>>>()
                    .map(Array1::from)
            }
        }
    }

    /// Index of a one-hot encoded item.
    pub fn index(&self, items: &[ObsActSpaceItem]) -> AirlResult<usize> {
        match (self, items) {
            (Self::OneHot { n }, [ObsActSpaceItem::Discrete(i)]) if *i >= 0 && (*i as usize) < *n => {
                Ok(*i as usize)
            }
            _ => Err(AirlError::config(
                "items",
                format!("{items:?} is not a discrete index of {self:?}"),
            )),
        }
    }
}

/// The fixed shapes every transition of a training run must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSchema {
    pub state: FeatureEncoder,
    pub action: FeatureEncoder,
}

impl TransitionSchema {
    pub fn new(obs_space: &ObsActSpace, act_space: &ObsActSpace) -> AirlResult<Self> {
        Ok(Self {
            state: FeatureEncoder::for_space(obs_space)?,
            action: FeatureEncoder::for_space(act_space)?,
        })
    }

    pub fn from_env<E: Env + ?Sized>(env: &E) -> AirlResult<Self> {
        Self::new(env.observation_space(), env.action_space())
    }

    pub fn check(&self, t: &Transition) -> AirlResult<()> {
        self.state.encode(&t.state)?;
        self.action.encode(&t.action)?;
        self.state.encode(&t.next_state)?;
        Ok(())
    }
}

/// Kronecker product; for two one-hots this is the one-hot of the pair.
pub fn kron(a: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
    iproduct!(a.iter(), b.iter()).map(|(x, y)| x * y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn one_hot_encoding() {
        let enc = FeatureEncoder::for_space(&ObsActSpace::Discrete { n: 4 }).unwrap();
        assert_eq!(enc.dim(), 4);
        assert_eq!(
            enc.encode(&[ObsActSpaceItem::Discrete(2)]).unwrap(),
            array![0., 0., 1., 0.]
        );
        assert_eq!(enc.index(&[ObsActSpaceItem::Discrete(3)]).unwrap(), 3);
    }

    #[test]
    fn dense_encoding() {
        let enc = FeatureEncoder::for_space(&ObsActSpace::Box {
            shape: vec![2],
            high: vec![0.6, 0.07],
            low: vec![-1.2, -0.07],
        })
        .unwrap();
        assert_eq!(enc, FeatureEncoder::Dense { dim: 2 });
        assert_eq!(
            enc.encode(&[
                ObsActSpaceItem::Continous(-0.5),
                ObsActSpaceItem::Continous(0.01)
            ])
            .unwrap(),
            array![-0.5, 0.01]
        );
        assert!(enc.index(&[ObsActSpaceItem::Continous(0.)]).is_err());
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![ObsActSpaceItem::Discrete(4)])]
    #[case(vec![ObsActSpaceItem::Discrete(-1)])]
    #[case(vec![ObsActSpaceItem::Continous(1.)])]
    #[case(vec![ObsActSpaceItem::Discrete(0), ObsActSpaceItem::Discrete(1)])]
    fn one_hot_rejects(#[case] items: Vec<ObsActSpaceItem>) {
        let enc = FeatureEncoder::OneHot { n: 4 };
        assert!(matches!(enc.encode(&items), Err(AirlError::Config { .. })));
    }

    #[test]
    fn tuple_spaces_are_unsupported() {
        let space = ObsActSpace::Tuple {
            spaces: vec![ObsActSpace::Discrete { n: 2 }],
        };
        assert!(FeatureEncoder::for_space(&space).is_err());
    }

    #[test]
    fn kron_of_one_hots_is_pair_one_hot() {
        let s = array![0., 1., 0.];
        let a = array![0., 0., 1., 0.];
        let sa = kron(&s, &a);
        assert_eq!(sa.len(), 12);
        assert_eq!(sa[4 + 2], 1.);
        assert_eq!(sa.sum(), 1.);
    }
}
