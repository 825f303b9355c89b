//! Environments simulated in-process.

pub mod frozen_lake;

pub use frozen_lake::{FrozenLake, MAP_4X4, MAP_8X8};
