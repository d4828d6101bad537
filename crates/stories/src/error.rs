use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoryError {
    /// The aggregate note changed between read and write twice in a row.
    #[error("{path} was modified concurrently while being updated")]
    ConcurrentModification { path: String },
    #[error("invalid date {input:?}: expected YYYY-MM-DD")]
    InvalidDate { input: String },
    #[error("vault path {path:?} must be relative and stay inside the vault")]
    InvalidPath { path: String },
}
