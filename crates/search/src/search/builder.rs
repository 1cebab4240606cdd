//! Query construction for post, channel and user searches
//!
//! Post search combines one visibility clause, one combined terms clause
//! and the request-wide filters of the first [`SearchParams`] element:
//!
//! ```text
//! Boolean
//!   must:     channel_id ∈ scope
//!             terms(p0) AND/OR terms(p1) ...
//!             Conjunction(in_channels, from_users, date ranges)   if any
//!   must_not: excluded channels, excluded users, excluded dates,
//!             excluded terms
//! ```

use anyhow::anyhow;
use log::debug;

use crate::error::{Result, SearchError};
use crate::models::{ChannelScope, SearchParams, UserSearchOptions};

use super::query::QueryNode;
use super::schema::{IndexKind, channel, post, user};

/// Build the post search query for a compound request
///
/// Channel, user and date filters are read from `params[0]` only; later
/// elements contribute their terms and nothing else.
///
/// Two per-element extensions sit on top of the plain terms clause:
/// `excluded_terms` adds a MUST-NOT match, and `is_hashtag` moves both
/// the terms and the exclusions from `message` to `hashtags`.
pub fn build_post_query(params: &[SearchParams], scope: &ChannelScope) -> Result<QueryNode> {
    let first = params.first().ok_or_else(|| SearchError::Query {
        op: "build_post_query",
        kind: IndexKind::Posts,
        source: anyhow!("A post search needs at least one set of search params"),
    })?;

    let channel_visibility = QueryNode::any_term(post::CHANNEL_ID, scope.channel_ids());

    let (filters, mut not_filters) = global_filters(first)?;

    let mut term_queries = Vec::with_capacity(params.len());
    for p in params {
        let field = terms_field(p);
        term_queries.push(QueryNode::matching(field, p.terms.as_str()));
        if !p.excluded_terms.trim().is_empty() {
            not_filters.push(QueryNode::matching(field, p.excluded_terms.as_str()));
        }
    }

    let all_terms = if first.or_terms {
        QueryNode::Disjunction(term_queries)
    } else {
        QueryNode::Conjunction(term_queries)
    };

    let mut must = vec![channel_visibility, all_terms];
    if !filters.is_empty() {
        must.push(QueryNode::Conjunction(filters));
    }

    debug!(
        "Built post query: {} params, {} scoped channels, {} exclusions",
        params.len(),
        scope.channel_ids().len(),
        not_filters.len()
    );

    Ok(QueryNode::Boolean {
        must,
        must_not: not_filters,
    })
}

fn terms_field(params: &SearchParams) -> &'static str {
    if params.is_hashtag {
        post::HASHTAGS
    } else {
        post::MESSAGE
    }
}

/// Request-wide filters: (must, must_not)
fn global_filters(params: &SearchParams) -> Result<(Vec<QueryNode>, Vec<QueryNode>)> {
    let mut filters = Vec::new();
    let mut not_filters = Vec::new();

    if !params.in_channels.is_empty() {
        filters.push(QueryNode::any_term(post::CHANNEL_ID, &params.in_channels));
    }
    if !params.excluded_channels.is_empty() {
        not_filters.push(QueryNode::any_term(post::CHANNEL_ID, &params.excluded_channels));
    }
    if !params.from_users.is_empty() {
        filters.push(QueryNode::any_term(post::USER_ID, &params.from_users));
    }
    if !params.excluded_users.is_empty() {
        not_filters.push(QueryNode::any_term(post::USER_ID, &params.excluded_users));
    }

    if !params.has_date_filter() {
        return Ok((filters, not_filters));
    }

    // on_date overrides every other date filter
    if !params.on_date.is_empty() {
        let (start, end) = params.on_date_millis()?;
        filters.push(QueryNode::range(
            post::CREATE_AT,
            Some(start as f64),
            Some(end as f64),
        ));
        return Ok((filters, not_filters));
    }

    if !params.after_date.is_empty() || !params.before_date.is_empty() {
        let min = if params.after_date.is_empty() {
            None
        } else {
            Some(params.after_date_millis()? as f64)
        };
        let max = if params.before_date.is_empty() {
            None
        } else {
            Some(params.before_date_millis()? as f64)
        };
        filters.push(QueryNode::range(post::CREATE_AT, min, max));
    }

    if !params.excluded_after_date.is_empty() {
        let min = params.excluded_after_date_millis()? as f64;
        not_filters.push(QueryNode::range(post::CREATE_AT, Some(min), None));
    }

    if !params.excluded_before_date.is_empty() {
        let max = params.excluded_before_date_millis()? as f64;
        not_filters.push(QueryNode::range(post::CREATE_AT, None, Some(max)));
    }

    if !params.excluded_date.is_empty() {
        let (start, end) = params.excluded_date_millis()?;
        not_filters.push(QueryNode::range(
            post::CREATE_AT,
            Some(start as f64),
            Some(end as f64),
        ));
    }

    Ok((filters, not_filters))
}

/// Channels of a team, optionally narrowed to names starting with `term`
pub fn build_channel_query(team_id: &str, term: &str) -> QueryNode {
    let mut queries = vec![QueryNode::term(channel::TEAM_ID, team_id)];
    if !term.is_empty() {
        queries.push(QueryNode::prefix(channel::NAME_SUGGEST, term.to_lowercase()));
    }
    QueryNode::Conjunction(queries)
}

/// The pair of user queries behind "add members to channel" autocomplete
#[derive(Debug, Clone, PartialEq)]
pub struct UsersInChannelQueries {
    /// Members of the channel
    pub in_channel: QueryNode,
    /// Team members outside the channel
    pub not_in_channel: QueryNode,
}

/// Whether a restriction list hides everything
///
/// `None` means unrestricted; `Some(&[])` means the caller may see no
/// channels at all and the search must not run.
pub fn restricts_to_nothing(restricted_to_channels: Option<&[String]>) -> bool {
    matches!(restricted_to_channels, Some(channels) if channels.is_empty())
}

/// Queries for users inside and outside `channel_id`
///
/// Returns `None` when the restriction list is present but empty.
pub fn build_users_in_channel_queries(
    team_id: &str,
    channel_id: &str,
    restricted_to_channels: Option<&[String]>,
    term: &str,
    options: &UserSearchOptions,
) -> Option<UsersInChannelQueries> {
    if restricts_to_nothing(restricted_to_channels) {
        return None;
    }

    let mut in_channel = Vec::new();
    if let Some(q) = suggestion_query(term, options) {
        in_channel.push(q);
    }
    in_channel.push(QueryNode::term(user::CHANNEL_IDS, channel_id));

    let mut must = Vec::new();
    if let Some(q) = suggestion_query(term, options) {
        must.push(q);
    }
    must.push(QueryNode::term(user::TEAM_IDS, team_id));
    if let Some(channels) = restricted_to_channels {
        must.push(QueryNode::any_term(user::CHANNEL_IDS, channels));
    }

    Some(UsersInChannelQueries {
        in_channel: QueryNode::Conjunction(in_channel),
        not_in_channel: QueryNode::Boolean {
            must,
            must_not: vec![QueryNode::term(user::CHANNEL_IDS, channel_id)],
        },
    })
}

/// Query for users in a team
///
/// Returns `None` when the restriction list is present but empty. With no
/// term, no team and no restriction every user matches.
pub fn build_users_in_team_query(
    team_id: &str,
    restricted_to_channels: Option<&[String]>,
    term: &str,
    options: &UserSearchOptions,
) -> Option<QueryNode> {
    if restricts_to_nothing(restricted_to_channels) {
        return None;
    }

    if term.is_empty() && team_id.is_empty() && restricted_to_channels.is_none() {
        return Some(QueryNode::MatchAll);
    }

    let mut must = Vec::new();
    if let Some(q) = suggestion_query(term, options) {
        must.push(q);
    }

    match restricted_to_channels {
        // Restricted channels already belong to the team
        Some(channels) => must.push(QueryNode::any_term(user::CHANNEL_IDS, channels)),
        None if !team_id.is_empty() => must.push(QueryNode::term(user::TEAM_IDS, team_id)),
        None => {}
    }

    Some(QueryNode::Boolean {
        must,
        must_not: Vec::new(),
    })
}

fn suggestion_query(term: &str, options: &UserSearchOptions) -> Option<QueryNode> {
    if term.is_empty() {
        return None;
    }
    let field = if options.allow_full_names {
        user::SUGGESTIONS_WITH_FULLNAME
    } else {
        user::SUGGESTIONS_WITHOUT_FULLNAME
    };
    Some(QueryNode::prefix(field, term.to_lowercase()))
}
