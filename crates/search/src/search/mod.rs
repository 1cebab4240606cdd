//! Full-text search over posts, users and channels using Tantivy
//!
//! - [`schema`]: declarative field tables, one per index
//! - [`documents`]: pure entity → record mappers
//! - [`builder`]: search parameters → [`QueryNode`] tree
//! - [`SearchIndex`]: a single Tantivy index with upsert/delete/search
//! - [`SearchEngine`]: lifecycle of the three indexes and the per-entity API

pub mod builder;
pub mod documents;
mod engine;
mod index;
pub mod query;
pub mod schema;
mod suggestions;

pub use builder::{
    UsersInChannelQueries, build_channel_query, build_post_query,
    build_users_in_channel_queries, build_users_in_team_query, restricts_to_nothing,
};
pub use documents::{ChannelDocument, PostDocument, UserDocument};
pub use engine::{CHANNEL_SEARCH_LIMIT, SearchEngine};
pub use index::{DEFAULT_HEAP_SIZE, MIN_HEAP_SIZE, SearchIndex};
pub use query::QueryNode;
pub use schema::{FieldKind, FieldSpec, IndexKind, SCHEMA_VERSION, build_schema};
