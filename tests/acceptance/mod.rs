//! Integration tests for the corelat measurement stack.
//!
//! These tests exercise the full substrate end to end:
//! - Hardware counter contract (monotonicity, frequency stability)
//! - Thread policy elevation and its error taxonomy
//! - Core-to-core ping-pong measurement runs
//! - All-pairs matrix sweeps
//!
//! Some tests require:
//! - Root privileges or CAP_SYS_NICE (Linux real-time elevation)
//! - At least two online CPU cores

mod common;
mod counter_test;
mod matrix_test;
mod pingpong_test;
mod policy_test;
