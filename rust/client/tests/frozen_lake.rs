extern crate float_eq;
extern crate gymnasium;
extern crate serde_json;

use float_eq::*;
use gymnasium::*;
use serde_json::to_value;

const API_URL: &str = "http://127.0.0.1:40004";

fn discrete(items: &[ObsActSpaceItem]) -> Discrete {
    items[0].discrete_value().unwrap()
}

#[test]
#[ignore = "needs a gymnasium http server on 127.0.0.1:40004"]
fn fl_advanced_make_env_e2e() {
    let mut env = Environment::new(
        API_URL,
        "FrozenLake-v1",
        Some(1),
        Some(false),
        Some(true),
        &[
            ("render_mode", to_value("ansi").unwrap()),
            ("is_slippery", to_value(false).unwrap()),
            ("desc", to_value(["GGGH", "GSGH", "GGGF", "FFFG"]).unwrap()),
        ],
    )
    .unwrap();
    assert_eq!(env.name(), "FrozenLake-v1");
    assert_eq!(env.observation_space(), &ObsActSpace::Discrete { n: 16 });
    assert_eq!(env.action_space(), &ObsActSpace::Discrete { n: 4 });
    assert_eq!(env.transitions().unwrap().len(), 64);

    let s = env.reset(Some(2718)).unwrap();
    assert_eq!(discrete(&s), 5);

    let rf = env.render().unwrap();
    assert_eq!(
        rf.as_str().unwrap(),
        "\nGGGH\nG\u{1b}[41mS\u{1b}[0mGH\nGGGF\nFFFG\n"
    );

    let si = env.step(&[ObsActSpaceItem::Discrete(1)]).unwrap();
    assert_eq!(discrete(&si.observation), 9);
    assert_eq!(format!("terminated: {}", si.terminated), "terminated: true");
    assert_eq!(format!("truncated: {}", si.truncated), "truncated: true");
    assert_float_eq!(si.reward, 1., rmax <= 1e-16);
}

#[test]
#[ignore = "needs a gymnasium http server on 127.0.0.1:40004"]
fn fl_server_matches_local_dynamics_e2e() {
    let desc = ["SFFF", "FHFH", "FFFH", "HFFG"];
    let env = Environment::new(
        API_URL,
        "FrozenLake-v1",
        None,
        None,
        None,
        &[
            ("is_slippery", to_value(true).unwrap()),
            ("desc", to_value(desc).unwrap()),
        ],
    )
    .unwrap();
    let local = envs::FrozenLake::new(&desc, true).unwrap();

    let remote = env.transitions().unwrap();
    let local = local.transitions().unwrap();
    for (k, ts) in local.iter() {
        assert_eq!(&remote[k], ts, "transitions differ for {k:?}");
    }
}

#[test]
fn unreachable_server_is_an_error() {
    let err = Environment::new("http://127.0.0.1:9", "FrozenLake-v1", None, None, None, &[])
        .unwrap_err();
    assert!(matches!(err, GymError::Http(_)));
}

#[test]
fn bundled_maps_are_exported_from_envs() {
    use gymnasium::envs::{FrozenLake, MAP_4X4, MAP_8X8};

    let small = FrozenLake::new(&MAP_4X4, true).unwrap();
    assert_eq!(small.observation_space(), &ObsActSpace::Discrete { n: 16 });
    let large = FrozenLake::new(&MAP_8X8, false).unwrap();
    assert_eq!(large.observation_space(), &ObsActSpace::Discrete { n: 64 });
    assert_eq!(large.transitions().unwrap().len(), 64 * 4);
}

#[test]
#[ignore = "needs a gymnasium http server on 127.0.0.1:40004"]
fn fl_server_lists_envs_and_samples_actions_e2e() {
    let all = Environment::envs(API_URL).unwrap();
    assert!(all.values().any(|id| id == "FrozenLake-v1"), "{all:?}");

    let env = Environment::new(API_URL, "FrozenLake-v1", None, None, None, &[]).unwrap();
    assert!(env.client_base_url().starts_with(API_URL));
    assert!(all.contains_key(env.instance_id()));

    for _ in 0..10 {
        let a = env.action_space_sample().unwrap();
        assert!(env.action_space().check(&a).is_ok(), "{a:?}");
    }
}
