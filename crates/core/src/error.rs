//! Error taxonomy shared by the engine and its collaborators.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The remote data source could not be reached.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// A snapshot violates the data model (negative balance, unconvertible value).
    #[error("Malformed snapshot: {0}")]
    Malformed(String),

    /// The node or the protocol refused the liquidation transaction.
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
