//! In-process FrozenLake with the same dynamics, reward and ansi rendering as gymnasium's `FrozenLake-v1`.
//! Refer: https://gymnasium.farama.org/environments/toy_text/frozen_lake/

use crate::mdps::pick_next;
use crate::*;
use serde_json::json;

const ACTION_NAMES: [&str; 4] = ["Left", "Down", "Right", "Up"];

pub const MAP_4X4: [&str; 4] = ["SFFF", "FHFH", "FFFH", "HFFG"];

pub const MAP_8X8: [&str; 8] = [
    "SFFFFFFF", "FFFFFFFF", "FFFHFFFF", "FFFFFHFF", "FFFHFFFF", "FHHFFFHF", "FHFFHFHF", "FFFHFFFG",
];

#[derive(Debug)]
pub struct FrozenLake {
    desc: Vec<Vec<u8>>,
    n_col: usize,
    obs_space: ObsActSpace,
    act_space: ObsActSpace,
    transitions: Rc<Transitions>,
    starts: Vec<Discrete>,
    max_episode_steps: Option<usize>,
    rng: StdRng,
    s: Option<Discrete>,
    last_action: Option<Discrete>,
    elapsed_steps: usize,
}

impl FrozenLake {
    /// `desc` rows use S (start), F (frozen), H (hole) and G (goal).
    pub fn new(desc: &[&str], is_slippery: bool) -> GymResult<Self> {
        let desc = desc.iter().map(|r| r.as_bytes().to_vec()).collect::<Vec<_>>();
        let n_row = desc.len();
        let n_col = desc.first().map_or(0, Vec::len);
        if n_row == 0 || n_col == 0 || desc.iter().any(|r| r.len() != n_col) {
            return Err(GymError::Protocol("FrozenLake map must be a non-empty rectangle.".into()));
        }
        if let Some(&c) = desc.iter().flatten().find(|&&c| !b"SFHG".contains(&c)) {
            return Err(GymError::Protocol(format!(
                "Unknown FrozenLake tile '{}'.",
                c as char
            )));
        }

        let starts = desc
            .iter()
            .flatten()
            .enumerate()
            .filter(|&(_, &c)| c == b'S')
            .map(|(s, _)| s as Discrete)
            .collect::<Vec<_>>();
        if starts.is_empty() {
            return Err(GymError::Protocol("FrozenLake map has no start tile.".into()));
        }

        let transitions = build_transitions(&desc, n_row, n_col, is_slippery);

        Ok(Self {
            obs_space: ObsActSpace::Discrete {
                n: (n_row * n_col) as Discrete,
            },
            act_space: ObsActSpace::Discrete { n: 4 },
            desc,
            n_col,
            transitions: Rc::new(transitions),
            starts,
            max_episode_steps: None,
            rng: StdRng::seed_from_u64(0),
            s: None,
            last_action: None,
            elapsed_steps: 0,
        })
    }

    /// Episodes are truncated after `n` steps, like gymnasium's `TimeLimit` wrapper.
    pub fn with_max_episode_steps(mut self, n: usize) -> Self {
        self.max_episode_steps = Some(n);
        self
    }

    pub fn n_s(&self) -> usize {
        self.desc.len() * self.n_col
    }

    pub fn n_a(&self) -> usize {
        ACTION_NAMES.len()
    }

    pub fn state(&self) -> Option<Discrete> {
        self.s
    }

    pub fn render(&self) -> RenderFrame {
        let mut out = match self.last_action {
            Some(a) => format!("  ({})\n", ACTION_NAMES[a as usize]),
            None => "\n".to_string(),
        };

        for (row, line) in self.desc.iter().enumerate() {
            for (col, &c) in line.iter().enumerate() {
                if self.s == Some((row * self.n_col + col) as Discrete) {
                    out.push_str(&format!("\u{1b}[41m{}\u{1b}[0m", c as char));
                } else {
                    out.push(c as char);
                }
            }
            out.push('\n');
        }

        RenderFrame::Ansi(out)
    }
}

fn build_transitions(desc: &[Vec<u8>], n_row: usize, n_col: usize, is_slippery: bool) -> Transitions {
    let inc = |row: usize, col: usize, a: Discrete| match a {
        0 => (row, col.saturating_sub(1)),
        1 => ((row + 1).min(n_row - 1), col),
        2 => (row, (col + 1).min(n_col - 1)),
        _ => (row.saturating_sub(1), col),
    };
    let update = |row: usize, col: usize, a: Discrete, probability: f64| {
        let (r, c) = inc(row, col, a);
        let letter = desc[r][c];
        Transition {
            next_state: (r * n_col + c) as Discrete,
            probability,
            reward: if letter == b'G' { 1. } else { 0. },
            done: b"GH".contains(&letter),
        }
    };

    let mut transitions = Transitions::new();
    for row in 0..n_row {
        for col in 0..n_col {
            let s = (row * n_col + col) as Discrete;
            for a in 0..ACTION_NAMES.len() as Discrete {
                let ts = if b"GH".contains(&desc[row][col]) {
                    vec![Transition {
                        next_state: s,
                        probability: 1.,
                        reward: 0.,
                        done: true,
                    }]
                } else if is_slippery {
                    [(a + 3) % 4, a, (a + 1) % 4]
                        .into_iter()
                        .map(|b| update(row, col, b, 1. / 3.))
                        .collect()
                } else {
                    vec![update(row, col, a, 1.)]
                };
                transitions.insert((s, a), ts);
            }
        }
    }

    transitions
}

impl Env for FrozenLake {
    fn name(&self) -> String {
        "FrozenLake-v1".to_string()
    }

    fn observation_space(&self) -> &ObsActSpace {
        &self.obs_space
    }

    fn action_space(&self) -> &ObsActSpace {
        &self.act_space
    }

    fn reset(&mut self, seed: Option<u64>) -> GymResult<Vec<ObsActSpaceItem>> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }

        let s = self.starts[self.rng.gen_range(0..self.starts.len())];
        self.s = Some(s);
        self.last_action = None;
        self.elapsed_steps = 0;

        Ok(vec![ObsActSpaceItem::Discrete(s)])
    }

    fn step(&mut self, action: &[ObsActSpaceItem]) -> GymResult<StepInfo> {
        self.act_space.check(action)?;
        let s = self.s.ok_or(GymError::NotReset)?;
        let a = action[0].discrete_value().unwrap_or_default();

        let ts = self
            .transitions
            .get(&(s, a))
            .ok_or_else(|| GymError::Protocol(format!("No transitions for ({s}, {a}).")))?;
        let t = *pick_next(&mut self.rng, ts)?;

        self.s = Some(t.next_state);
        self.last_action = Some(a);
        self.elapsed_steps += 1;

        Ok(StepInfo {
            observation: vec![ObsActSpaceItem::Discrete(t.next_state)],
            reward: t.reward,
            truncated: self
                .max_episode_steps
                .map_or(false, |m| self.elapsed_steps >= m),
            terminated: t.done,
            info: json!({ "prob": t.probability }),
        })
    }
}

impl TabularModel for FrozenLake {
    fn transitions(&self) -> GymResult<Rc<Transitions>> {
        Ok(Rc::clone(&self.transitions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;
    use rstest::rstest;

    fn discrete(items: &[ObsActSpaceItem]) -> Discrete {
        items[0].discrete_value().unwrap()
    }

    #[test]
    fn fl_local_make_env() {
        let env = FrozenLake::new(&["GGGH", "GSGH", "GGGF", "FFFG"], false).unwrap();
        assert_eq!(env.name(), "FrozenLake-v1");
        assert_eq!(env.observation_space(), &ObsActSpace::Discrete { n: 16 });
        assert_eq!(env.action_space(), &ObsActSpace::Discrete { n: 4 });
        assert_eq!(env.transitions().unwrap().len(), 64);
    }

    #[test]
    fn fl_local_render_and_step() {
        let mut env = FrozenLake::new(&["GGGH", "GSGH", "GGGF", "FFFG"], false)
            .unwrap()
            .with_max_episode_steps(1);

        let s = env.reset(Some(2718)).unwrap();
        assert_eq!(discrete(&s), 5);
        assert_eq!(
            env.render().as_str().unwrap(),
            "\nGGGH\nG\u{1b}[41mS\u{1b}[0mGH\nGGGF\nFFFG\n"
        );

        let si = env.step(&[ObsActSpaceItem::Discrete(1)]).unwrap();
        assert_eq!(discrete(&si.observation), 9);
        assert!(si.terminated);
        assert!(si.truncated);
        assert_float_eq!(si.reward, 1., rmax <= 1e-16);
        assert_eq!(
            env.render().as_str().unwrap(),
            "  (Down)\nGGGH\nGSGH\nG\u{1b}[41mG\u{1b}[0mGF\nFFFG\n"
        );
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 4)]
    #[case(2, 1)]
    #[case(3, 0)]
    fn fl_local_moves_from_start(#[case] action: Discrete, #[case] next: Discrete) {
        let mut env = FrozenLake::new(&MAP_4X4, false).unwrap();
        env.reset(Some(1)).unwrap();

        let si = env.step(&[ObsActSpaceItem::Discrete(action)]).unwrap();
        assert_eq!(discrete(&si.observation), next);
        assert!(!si.done());
    }

    #[test]
    fn fl_local_slippery_transitions_are_distributions() {
        let env = FrozenLake::new(&MAP_8X8, true).unwrap();
        let transitions = env.transitions().unwrap();

        assert_eq!(transitions.len(), 64 * 4);
        for ts in transitions.values() {
            let total = ts.iter().map(|t| t.probability).sum::<f64>();
            assert_float_eq!(total, 1., abs <= 1e-12);
        }
        // Hole: absorbing.
        assert_eq!(
            transitions[&(19, 2)],
            vec![Transition {
                next_state: 19,
                probability: 1.,
                reward: 0.,
                done: true
            }]
        );
    }

    #[test]
    fn fl_local_seeded_resets_replay_the_same_episode() {
        let mut env = FrozenLake::new(&MAP_4X4, true).unwrap();
        let run = |env: &mut FrozenLake| {
            env.reset(Some(42)).unwrap();
            (0..10)
                .map(|i| {
                    let si = env.step(&[ObsActSpaceItem::Discrete(i % 4)]).unwrap();
                    discrete(&si.observation)
                })
                .collect::<Vec<_>>()
        };

        let first = run(&mut env);
        let second = run(&mut env);
        assert_eq!(first, second);
    }

    #[test]
    fn fl_local_rejects_bad_input() {
        assert!(FrozenLake::new(&["SF", "F"], false).is_err());
        assert!(FrozenLake::new(&["FF", "FG"], false).is_err());
        assert!(FrozenLake::new(&["SX", "FG"], false).is_err());

        let mut env = FrozenLake::new(&["SF", "FG"], false).unwrap();
        assert!(matches!(
            env.step(&[ObsActSpaceItem::Discrete(0)]),
            Err(GymError::NotReset)
        ));

        env.reset(None).unwrap();
        let err = env.step(&[ObsActSpaceItem::Discrete(7)]).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"invalid action: For Discrete space: 7 is outside 0..4.");
    }
}
