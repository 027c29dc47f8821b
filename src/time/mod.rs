//! Frame pacing
//!
//! Turns per-frame delays into wall-clock deadlines. See [`clock`].

pub mod clock;

pub use clock::{AvSyncClock, DelayModel, WaitOutcome, DEFAULT_POLL_INTERVAL};
