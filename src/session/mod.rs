//! Per-connection conversation handling.
//!
//! A [`SessionController`] turns a stream of transcript tokens into previews and one
//! final answer per utterance:
//!
//! - every token bumps a sequence number, cancels the in-flight [`attempt::Attempt`] and
//!   starts a new one on the whole accumulated text;
//! - attempts publish a `preview` only while their sequence number is still the latest;
//! - end-of-utterance waits (bounded) for the last attempt, emits `complete` and hands
//!   the answer to the per-connection speech worker.

pub mod attempt;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod registry;
pub mod speech;
pub mod state;


pub use config::SessionConfig;
pub use controller::{FinalizedAnswer, SessionController, SessionServices};
pub use engine::{Answer, AnswerSource, ResponseEngine};
pub use error::{SessionError, SessionResult};
pub use events::{ClientEvent, ServerEvent, parse_client_event};
pub use registry::{SessionRegistry, SessionSummary};
pub use state::SessionState;
