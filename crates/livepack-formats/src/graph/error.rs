//! Error types for resource graph construction

use thiserror::Error;

/// Resource graph result type
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while building a resource graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Url is empty or does not start with `/`
    #[error("Invalid resource url: '{0}'")]
    InvalidUrl(String),

    /// Parent url has not been added yet
    #[error("Unknown parent resource: {0}")]
    UnknownParent(String),

    /// Edge would make a resource its own ancestor
    #[error("Adding {child} under {parent} would create a cycle")]
    Cycle {
        /// Parent url of the rejected edge
        parent: String,
        /// Child url of the rejected edge
        child: String,
    },
}
