//! Concurrent multi-provider generation.
//!
//! Every enabled provider receives the prompt at once. Under
//! [`RaceStrategy::FirstWin`] the first answer passing the [`QualityGate`] wins and the
//! others are cancelled; under [`RaceStrategy::RaceWithTimeout`] answers are collected
//! for a fixed window and ranked by [`Priority`]. When nothing usable arrives the racer
//! answers with a fixed fallback sentence.

pub mod error;
pub mod quality;
#[allow(clippy::module_inception)]
pub mod racer;
pub mod types;


pub use error::{RaceError, RaceResult};
pub use quality::QualityGate;
pub use racer::{ProviderRacer, RaceStatsSnapshot, RacerConfig};
pub use types::{FALLBACK_PROVIDER, Priority, ProviderConfig, ProviderResult, RaceStrategy};
