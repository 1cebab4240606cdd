//! Error types for the search engine

use std::fmt;

use crate::search::IndexKind;

/// Lifecycle step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Open,
    Close,
    Purge,
    Refresh,
    Retention,
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleOp::Open => "open",
            LifecycleOp::Close => "close",
            LifecycleOp::Purge => "purge",
            LifecycleOp::Refresh => "refresh",
            LifecycleOp::Retention => "retention",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by [`crate::SearchEngine`]
///
/// Every engine failure names the operation and index kind it happened on;
/// nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Failed to {op} {kind} index: {source:#}")]
    Lifecycle {
        op: LifecycleOp,
        kind: IndexKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to index {kind} document {id}: {source:#}")]
    Index {
        kind: IndexKind,
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to delete {kind} document {id}: {source:#}")]
    Delete {
        kind: IndexKind,
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{op} failed on {kind} index: {source:#}")]
    Query {
        op: &'static str,
        kind: IndexKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid date for {field}: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("Invalid time zone offset: {0} seconds")]
    InvalidTimeZoneOffset(i32),

    #[error("The {0} index is not open")]
    NotStarted(IndexKind),

    #[error("Invalid search settings: {0:#}")]
    Config(anyhow::Error),
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_message_names_op_and_kind() {
        let err = SearchError::Lifecycle {
            op: LifecycleOp::Open,
            kind: IndexKind::Posts,
            source: anyhow::anyhow!("permission denied"),
        };
        assert_eq!(err.to_string(), "Failed to open posts index: permission denied");
    }

    #[test]
    fn test_query_message_keeps_context_chain() {
        let source = anyhow::anyhow!("disk gone").context("search execution");
        let err = SearchError::Query {
            op: "search_posts",
            kind: IndexKind::Posts,
            source,
        };
        assert_eq!(
            err.to_string(),
            "search_posts failed on posts index: search execution: disk gone"
        );
    }
}
