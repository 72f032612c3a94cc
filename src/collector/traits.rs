//! Core collector trait and error type.

use thiserror::Error;

use crate::liquidsoap::LiquidsoapError;

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The control connection failed or is closed.
    #[error(transparent)]
    Liquidsoap(#[from] LiquidsoapError),

    /// A level query returned something that is not a number.
    #[error("invalid level reply for source '{name}': {reply:?}")]
    Parse { name: String, reply: String },

    /// Collection attempted before sources were discovered.
    #[error("collector has not been started")]
    NotStarted,
}

impl CollectorError {
    /// Whether the connection is shut down or no longer usable.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::Liquidsoap(LiquidsoapError::Closed | LiquidsoapError::Poisoned(_))
        )
    }

    /// Whether replies got paired with the wrong commands, so the process must restart.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Liquidsoap(e) if e.is_desync())
    }
}

/// Something that refreshes exported values on demand.
///
/// The scrape endpoint calls [`collect`](Collector::collect) once per request
/// before serializing the registry.
///
/// # Returns
///
/// - `Ok(())`: every value was refreshed
/// - `Err(CollectorError::Parse)`: the engine answered nonsense; nothing from this
///   cycle is published
/// - `Err(CollectorError::Liquidsoap)`: the connection failed mid-cycle
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Perform one collection cycle.
    async fn collect(&self) -> Result<(), CollectorError>;
}
