//! Search engine lifecycle and per-entity operations
//!
//! `SearchEngine` owns the three indexes behind a readers-writer lock:
//! index, delete and search calls share the read side, while start, stop
//! and reconfiguration take the write side and so never interleave with
//! traffic.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::config::SearchSettings;
use crate::error::{LifecycleOp, Result, SearchError};
use crate::models::{Channel, ChannelScope, Post, SearchParams, User, UserSearchOptions};

use super::builder::{
    build_channel_query, build_post_query, build_users_in_channel_queries,
    build_users_in_team_query,
};
use super::documents::{ChannelDocument, PostDocument, UserDocument};
use super::index::SearchIndex;
use super::query::QueryNode;
use super::schema::{ChannelFields, IndexKind, PostFields, SCHEMA_VERSION, UserFields, post};

/// Maximum channels returned by a channel autocomplete
pub const CHANNEL_SEARCH_LIMIT: usize = 50;

const ENGINE_NAME: &str = "tantivy";

/// The three open indexes with their resolved field handles
struct Indexes {
    posts: SearchIndex,
    post_fields: PostFields,
    users: SearchIndex,
    user_fields: UserFields,
    channels: SearchIndex,
    channel_fields: ChannelFields,
}

impl Indexes {
    fn open(settings: &SearchSettings) -> Result<Self> {
        let open = |kind: IndexKind| {
            SearchIndex::open(settings.index_path(kind), kind, settings.writer_heap_bytes)
                .map_err(|source| lifecycle(LifecycleOp::Open, kind, source))
        };

        let posts = open(IndexKind::Posts)?;
        let post_fields = PostFields::new(&posts.index().schema())
            .map_err(|source| lifecycle(LifecycleOp::Open, IndexKind::Posts, source))?;

        let users = open(IndexKind::Users)?;
        let user_fields = UserFields::new(&users.index().schema())
            .map_err(|source| lifecycle(LifecycleOp::Open, IndexKind::Users, source))?;

        let channels = open(IndexKind::Channels)?;
        let channel_fields = ChannelFields::new(&channels.index().schema())
            .map_err(|source| lifecycle(LifecycleOp::Open, IndexKind::Channels, source))?;

        Ok(Self {
            posts,
            post_fields,
            users,
            user_fields,
            channels,
            channel_fields,
        })
    }

    fn get(&self, kind: IndexKind) -> &SearchIndex {
        match kind {
            IndexKind::Posts => &self.posts,
            IndexKind::Users => &self.users,
            IndexKind::Channels => &self.channels,
        }
    }
}

fn lifecycle(op: LifecycleOp, kind: IndexKind, source: anyhow::Error) -> SearchError {
    SearchError::Lifecycle { op, kind, source }
}

struct EngineState {
    settings: SearchSettings,
    indexes: Option<Indexes>,
}

impl EngineState {
    /// Indexes to operate on, `None` when indexing is switched off
    fn active_indexes(&self, kind: IndexKind) -> Result<Option<&Indexes>> {
        if !self.settings.is_active() {
            return Ok(None);
        }
        self.indexes
            .as_ref()
            .map(Some)
            .ok_or(SearchError::NotStarted(kind))
    }

    fn start(&mut self) -> Result<()> {
        if !self.settings.is_active() {
            return Ok(());
        }
        if self.indexes.is_some() {
            return Ok(());
        }

        info!("Starting search engine at {}", self.settings.index_dir);
        self.indexes = Some(Indexes::open(&self.settings)?);
        Ok(())
    }

    /// Close every open index, returning the first failure after trying all
    fn stop(&mut self) -> Result<()> {
        let Some(indexes) = self.indexes.take() else {
            return Ok(());
        };

        info!("Stopping search engine");
        let mut first_error = None;
        for kind in IndexKind::ALL {
            if let Err(source) = indexes.get(kind).close() {
                warn!("Failed to close {} index: {:#}", kind, source);
                first_error.get_or_insert(lifecycle(LifecycleOp::Close, kind, source));
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Local full-text search over posts, users and channels
pub struct SearchEngine {
    state: RwLock<EngineState>,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("SearchEngine")
            .field("settings", &state.settings)
            .field("started", &state.indexes.is_some())
            .finish()
    }
}

impl SearchEngine {
    /// Create an engine; nothing is opened until [`SearchEngine::start`]
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            state: RwLock::new(EngineState {
                settings,
                indexes: None,
            }),
        }
    }

    // A panic while holding the lock cannot leave the state half-updated:
    // `indexes` is only ever replaced whole.
    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // === Lifecycle ===

    /// Open (or create) the three indexes
    ///
    /// A no-op when indexing is disabled or the indexes are already open.
    pub fn start(&self) -> Result<()> {
        self.write().start()
    }

    /// Close all open indexes
    pub fn stop(&self) -> Result<()> {
        self.write().stop()
    }

    /// Indexing is enabled and an index directory is configured
    ///
    /// Reflects configuration only, not whether the indexes are open; see
    /// [`SearchEngine::is_started`] for that.
    pub fn is_active(&self) -> bool {
        self.read().settings.is_active()
    }

    /// The indexes are currently open
    pub fn is_started(&self) -> bool {
        self.read().indexes.is_some()
    }

    pub fn is_indexing_enabled(&self) -> bool {
        self.read().settings.enable_indexing
    }

    pub fn is_search_enabled(&self) -> bool {
        self.read().settings.enable_searching
    }

    pub fn is_autocompletion_enabled(&self) -> bool {
        self.read().settings.enable_autocomplete
    }

    pub fn is_indexing_sync(&self) -> bool {
        self.read().settings.index_sync
    }

    pub fn settings(&self) -> SearchSettings {
        self.read().settings.clone()
    }

    pub fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    pub fn version(&self) -> u32 {
        SCHEMA_VERSION
    }

    /// Apply new settings
    ///
    /// Going from inactive to active restarts the engine on the new
    /// settings; any other change swaps the settings and leaves the open
    /// indexes as they are.
    pub fn update_config(&self, settings: SearchSettings) -> Result<()> {
        let mut state = self.write();
        if !state.settings.is_active() && settings.is_active() {
            info!("Search indexing enabled, starting engine");
            state.stop()?;
            state.settings = settings;
            return state.start();
        }

        state.settings = settings;
        Ok(())
    }

    /// Check that `settings` could be applied
    pub fn test_config(&self, settings: &SearchSettings) -> Result<()> {
        settings.validate().map_err(SearchError::Config)
    }

    /// Reload index readers
    pub fn refresh_indexes(&self) -> Result<()> {
        let state = self.read();
        let Some(indexes) = state.indexes.as_ref() else {
            return Ok(());
        };
        for kind in IndexKind::ALL {
            indexes
                .get(kind)
                .reload()
                .map_err(|source| lifecycle(LifecycleOp::Refresh, kind, source))?;
        }
        Ok(())
    }

    /// Remove every document from all three indexes
    pub fn purge_indexes(&self) -> Result<()> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Posts)? else {
            return Ok(());
        };

        warn!("Purging all search indexes");
        for kind in IndexKind::ALL {
            indexes
                .get(kind)
                .clear()
                .map_err(|source| lifecycle(LifecycleOp::Purge, kind, source))?;
        }
        Ok(())
    }

    /// Delete posts created strictly before `cutoff`
    pub fn data_retention_delete_indexes(&self, cutoff: DateTime<Utc>) -> Result<()> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Posts)? else {
            return Ok(());
        };

        let cutoff_ms = cutoff.timestamp_millis();
        info!("Deleting indexed posts created before {}", cutoff);
        let expired = QueryNode::range(post::CREATE_AT, None, Some((cutoff_ms - 1) as f64));
        indexes
            .posts
            .delete_matching(&expired)
            .map_err(|source| lifecycle(LifecycleOp::Retention, IndexKind::Posts, source))
    }

    // === Posts ===

    pub fn index_post(&self, post: &Post, team_id: &str) -> Result<()> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Posts)? else {
            return Ok(());
        };

        let doc = PostDocument::from_post(post, team_id);
        indexes
            .posts
            .upsert(&doc.id, doc.to_document(&indexes.post_fields))
            .map_err(|source| SearchError::Index {
                kind: IndexKind::Posts,
                id: post.id.clone(),
                source,
            })
    }

    pub fn delete_post(&self, post: &Post) -> Result<()> {
        self.delete(IndexKind::Posts, &post.id)
    }

    /// Search posts in `scope`; returns post ids in relevance order
    ///
    /// `page` is zero-based.
    pub fn search_posts(
        &self,
        scope: &ChannelScope,
        params: &[SearchParams],
        page: usize,
        per_page: usize,
    ) -> Result<Vec<String>> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Posts)? else {
            return Ok(Vec::new());
        };

        let query = build_post_query(params, scope)?;
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        // A page starting past the addressable range cannot hold any hits
        let Some(offset) = page.checked_mul(per_page) else {
            return Ok(Vec::new());
        };
        indexes
            .posts
            .search(&query, per_page, offset)
            .map_err(|source| SearchError::Query {
                op: "search_posts",
                kind: IndexKind::Posts,
                source,
            })
    }

    /// Stored projection of an indexed post
    pub fn get_post_document(&self, id: &str) -> Result<Option<PostDocument>> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Posts)? else {
            return Ok(None);
        };
        let doc = indexes
            .posts
            .get(id)
            .map_err(|source| query_error("get_post_document", IndexKind::Posts, source))?;
        Ok(doc.map(|d| PostDocument::from_document(&d, &indexes.post_fields)))
    }

    // === Channels ===

    pub fn index_channel(&self, channel: &Channel) -> Result<()> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Channels)? else {
            return Ok(());
        };

        let doc = ChannelDocument::from_channel(channel);
        indexes
            .channels
            .upsert(&doc.id, doc.to_document(&indexes.channel_fields))
            .map_err(|source| SearchError::Index {
                kind: IndexKind::Channels,
                id: channel.id.clone(),
                source,
            })
    }

    pub fn delete_channel(&self, channel: &Channel) -> Result<()> {
        self.delete(IndexKind::Channels, &channel.id)
    }

    /// Channels of `team_id` whose names start with `term` (case-insensitive)
    pub fn search_channels(&self, team_id: &str, term: &str) -> Result<Vec<String>> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Channels)? else {
            return Ok(Vec::new());
        };

        let query = build_channel_query(team_id, term);
        indexes
            .channels
            .search(&query, CHANNEL_SEARCH_LIMIT, 0)
            .map_err(|source| query_error("search_channels", IndexKind::Channels, source))
    }

    pub fn get_channel_document(&self, id: &str) -> Result<Option<ChannelDocument>> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Channels)? else {
            return Ok(None);
        };
        let doc = indexes
            .channels
            .get(id)
            .map_err(|source| query_error("get_channel_document", IndexKind::Channels, source))?;
        Ok(doc.map(|d| ChannelDocument::from_document(&d, &indexes.channel_fields)))
    }

    // === Users ===

    pub fn index_user(&self, user: &User, team_ids: &[String], channel_ids: &[String]) -> Result<()> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Users)? else {
            return Ok(());
        };

        let doc = UserDocument::from_user(user, team_ids, channel_ids);
        indexes
            .users
            .upsert(&doc.id, doc.to_document(&indexes.user_fields))
            .map_err(|source| SearchError::Index {
                kind: IndexKind::Users,
                id: user.id.clone(),
                source,
            })
    }

    pub fn delete_user(&self, user: &User) -> Result<()> {
        self.delete(IndexKind::Users, &user.id)
    }

    /// Users matching `term`, split into (members of `channel_id`, team
    /// members outside it)
    ///
    /// A present but empty `restricted_to_channels` returns two empty lists
    /// without searching.
    pub fn search_users_in_channel(
        &self,
        team_id: &str,
        channel_id: &str,
        restricted_to_channels: Option<&[String]>,
        term: &str,
        options: &UserSearchOptions,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Users)? else {
            return Ok((Vec::new(), Vec::new()));
        };

        let Some(queries) = build_users_in_channel_queries(
            team_id,
            channel_id,
            restricted_to_channels,
            term,
            options,
        ) else {
            return Ok((Vec::new(), Vec::new()));
        };

        let in_channel = indexes
            .users
            .search(&queries.in_channel, options.limit, 0)
            .map_err(|source| query_error("search_users_in_channel", IndexKind::Users, source))?;
        let not_in_channel = indexes
            .users
            .search(&queries.not_in_channel, options.limit, 0)
            .map_err(|source| {
                query_error("search_users_not_in_channel", IndexKind::Users, source)
            })?;

        Ok((in_channel, not_in_channel))
    }

    /// Users of `team_id` matching `term`
    ///
    /// A present but empty `restricted_to_channels` returns no users without
    /// searching; no term, no team and no restriction returns every user.
    pub fn search_users_in_team(
        &self,
        team_id: &str,
        restricted_to_channels: Option<&[String]>,
        term: &str,
        options: &UserSearchOptions,
    ) -> Result<Vec<String>> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Users)? else {
            return Ok(Vec::new());
        };

        let Some(query) = build_users_in_team_query(team_id, restricted_to_channels, term, options)
        else {
            return Ok(Vec::new());
        };

        indexes
            .users
            .search(&query, options.limit, 0)
            .map_err(|source| query_error("search_users_in_team", IndexKind::Users, source))
    }

    pub fn get_user_document(&self, id: &str) -> Result<Option<UserDocument>> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(IndexKind::Users)? else {
            return Ok(None);
        };
        let doc = indexes
            .users
            .get(id)
            .map_err(|source| query_error("get_user_document", IndexKind::Users, source))?;
        Ok(doc.map(|d| UserDocument::from_document(&d, &indexes.user_fields)))
    }

    fn delete(&self, kind: IndexKind, id: &str) -> Result<()> {
        let state = self.read();
        let Some(indexes) = state.active_indexes(kind)? else {
            return Ok(());
        };
        indexes
            .get(kind)
            .delete(id)
            .map_err(|source| SearchError::Delete {
                kind,
                id: id.to_string(),
                source,
            })
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        if let Err(e) = self.write().stop() {
            warn!("Search engine did not shut down cleanly: {}", e);
        }
    }
}

fn query_error(op: &'static str, kind: IndexKind, source: anyhow::Error) -> SearchError {
    SearchError::Query { op, kind, source }
}
