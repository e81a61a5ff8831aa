use thiserror::Error;

/// Errors surfaced by [`super::ProviderRacer::race`].
///
/// Provider failures never surface here: they are folded into the race and, when
/// nothing usable is left, into the fallback answer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RaceError {
    /// The caller cancelled the race before a winner was chosen.
    #[error("race cancelled by caller")]
    Cancelled,
}

pub type RaceResult<T> = Result<T, RaceError>;
