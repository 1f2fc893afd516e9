#![doc = "Measurement substrate: hardware timestamp registers and thread scheduling policy."]

pub mod counter;
pub mod policy;

pub use counter::*;
pub use policy::*;
