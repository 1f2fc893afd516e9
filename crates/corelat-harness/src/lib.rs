#![doc = "Measurement harness: timebase selection, core pinning, and the pair and matrix samplers."]

pub mod affinity;
pub mod matrix;
pub mod pingpong;
pub mod timebase;

pub use affinity::*;
pub use matrix::*;
pub use pingpong::*;
pub use timebase::*;
