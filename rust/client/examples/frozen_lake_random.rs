extern crate gymnasium;

use gymnasium::{envs::frozen_lake::*, mdps::*, *};

fn main() -> GymResult<()> {
    let mut env = FrozenLake::new(&MAP_8X8, true)?.with_max_episode_steps(100);
    let mut policy = RandomPolicy::new(env.action_space().clone(), 2718);

    println!("observation space:\n{:?}\n", env.observation_space());
    println!("action space:\n{:?}\n", env.action_space());
    let transitions_14_2 = &env.transitions()?[&(14, 2)];
    println!("transtion:\n{:?}\n", transitions_14_2);

    for ep in 0..10 {
        let mut s = env.reset(Some(2718 + ep))?;
        let mut tot_reward = 0.;
        loop {
            let action = policy.policy(&s)?;
            let state = env.step(&action)?;
            print!("{esc}[2J{esc}[1;1H", esc = 27 as char);
            println!("{}", env.render().as_str().unwrap_or_default());
            tot_reward += state.reward;
            s = state.observation;

            if state.truncated || state.terminated {
                break;
            }
        }
        println!("Finished episode {} with total reward {}", ep, tot_reward);
    }

    Ok(())
}
