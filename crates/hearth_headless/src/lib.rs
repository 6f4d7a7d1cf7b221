//! Headless runner for the settlement simulation.
//!
//! Drives [`hearth_core`] without graphics so that scripted controllers,
//! CI jobs and balance runs can play a match:
//!
//! - **Scenarios**: RON files describing config overrides and the opening
//!   layout ([`scenario`])
//! - **Matches**: fixed-length runs printing one JSON stats line per
//!   simulated second ([`runner::run_match`])
//! - **Sessions**: the player's command surface as JSON lines on stdin,
//!   answered on stdout ([`runner::Session`], [`protocol`])
//!
//! Logs go to stderr so stdout stays machine-readable.
//!
//! # Example
//!
//! ```bash
//! # Play a scenario for one simulated minute
//! cargo run -p hearth_headless -- run --scenario village.ron --ticks 1200 --seed 7
//!
//! # Drive a session by hand
//! echo '{"cmd":"tick","count":20}' | cargo run -p hearth_headless -- interactive
//! ```

pub mod protocol;
pub mod runner;
pub mod scenario;

pub use protocol::{Request, Response};
pub use runner::{run_match, MatchSummary, Session};
pub use scenario::{Scenario, ScenarioError};
