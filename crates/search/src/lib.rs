//! Search crate - local full-text search for a chat application
//!
//! This crate adapts posts, users and channels onto three Tantivy indexes:
//! - Domain models (Post, User, Channel, SearchParams)
//! - Document mappers producing flat indexable records
//! - A query builder turning structured search requests into boolean
//!   query trees
//! - `SearchEngine`: index lifecycle plus index/delete/search per entity
//!
//! Configuration comes from `search.json` in the shared Murmur config
//! directory (see [`SearchSettings`]). Logging goes through the `log`
//! facade; the host installs the backend.

pub mod config;
pub mod error;
pub mod models;
pub mod search;

pub use crate::config::SearchSettings;
pub use error::{LifecycleOp, Result, SearchError};
pub use models::{Attachment, Channel, ChannelScope, Post, SearchParams, User, UserSearchOptions};
pub use search::{
    ChannelDocument, IndexKind, PostDocument, QueryNode, SearchEngine, SearchIndex, UserDocument,
    build_post_query,
};
