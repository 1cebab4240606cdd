//! Declarative Tantivy schemas for the three indexes
//!
//! Each index kind has a static field table. A field is exactly one of:
//! - keyword: raw, untokenized, case-sensitive exact match (ids, suggestions)
//! - text: default tokenizer with positions, relevance-ranked matching
//! - numeric: f64, range-queryable
//!
//! The schema is fixed when an index is created. Changing a field's kind
//! means rebuilding that index.

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tantivy::schema::{
    Field, INDEXED, IndexRecordOption, FAST, STORED, STRING, Schema, TextFieldIndexing,
    TextOptions,
};

/// Bumped whenever a field table changes
pub const SCHEMA_VERSION: u32 = 1;

/// Field names of the posts index
pub mod post {
    pub const ID: &str = "id";
    pub const TEAM_ID: &str = "team_id";
    pub const CHANNEL_ID: &str = "channel_id";
    pub const USER_ID: &str = "user_id";
    pub const CREATE_AT: &str = "create_at";
    pub const MESSAGE: &str = "message";
    pub const TYPE: &str = "type";
    pub const HASHTAGS: &str = "hashtags";
    pub const ATTACHMENTS: &str = "attachments";
}

/// Field names of the users index
pub mod user {
    pub const ID: &str = "id";
    pub const SUGGESTIONS_WITH_FULLNAME: &str = "suggestions_with_fullname";
    pub const SUGGESTIONS_WITHOUT_FULLNAME: &str = "suggestions_without_fullname";
    pub const TEAM_IDS: &str = "team_ids";
    pub const CHANNEL_IDS: &str = "channel_ids";
}

/// Field names of the channels index
pub mod channel {
    pub const ID: &str = "id";
    pub const TEAM_ID: &str = "team_id";
    pub const NAME_SUGGEST: &str = "name_suggest";
}

/// How a field is indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Keyword,
    Text,
    Numeric,
}

/// One row of a field table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn keyword(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Keyword }
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Text }
}

const fn numeric(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Numeric }
}

pub const POST_FIELDS: &[FieldSpec] = &[
    keyword(post::ID),
    keyword(post::TEAM_ID),
    keyword(post::CHANNEL_ID),
    keyword(post::USER_ID),
    numeric(post::CREATE_AT),
    text(post::MESSAGE),
    keyword(post::TYPE),
    text(post::HASHTAGS),
    text(post::ATTACHMENTS),
];

pub const USER_FIELDS: &[FieldSpec] = &[
    keyword(user::ID),
    keyword(user::SUGGESTIONS_WITH_FULLNAME),
    keyword(user::SUGGESTIONS_WITHOUT_FULLNAME),
    keyword(user::TEAM_IDS),
    keyword(user::CHANNEL_IDS),
];

pub const CHANNEL_FIELDS: &[FieldSpec] = &[
    keyword(channel::ID),
    keyword(channel::TEAM_ID),
    keyword(channel::NAME_SUGGEST),
];

/// The three indexes managed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Posts,
    Users,
    Channels,
}

impl IndexKind {
    pub const ALL: [IndexKind; 3] = [IndexKind::Posts, IndexKind::Users, IndexKind::Channels];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Posts => "posts",
            IndexKind::Users => "users",
            IndexKind::Channels => "channels",
        }
    }

    /// Directory name of this index under the configured index dir
    pub fn dir_name(self) -> &'static str {
        self.as_str()
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            IndexKind::Posts => POST_FIELDS,
            IndexKind::Users => USER_FIELDS,
            IndexKind::Channels => CHANNEL_FIELDS,
        }
    }

    /// Every index keys its documents by this keyword field
    pub fn id_field(self) -> &'static str {
        "id"
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the Tantivy schema for an index kind from its field table
pub fn build_schema(kind: IndexKind) -> Schema {
    let mut builder = Schema::builder();

    let text_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_index_option(IndexRecordOption::WithFreqsAndPositions)
                .set_tokenizer("default"),
        )
        .set_stored();

    for spec in kind.fields() {
        match spec.kind {
            FieldKind::Keyword => {
                builder.add_text_field(spec.name, STRING | STORED);
            }
            FieldKind::Text => {
                builder.add_text_field(spec.name, text_opts.clone());
            }
            FieldKind::Numeric => {
                builder.add_f64_field(spec.name, INDEXED | FAST | STORED);
            }
        }
    }

    builder.build()
}

/// Look up the declared kind of a field
pub fn field_kind(kind: IndexKind, name: &str) -> Option<FieldKind> {
    kind.fields()
        .iter()
        .find(|spec| spec.name == name)
        .map(|spec| spec.kind)
}

fn resolve(schema: &Schema, name: &str) -> Result<Field> {
    schema
        .get_field(name)
        .with_context(|| format!("Schema has no field named {}", name))
}

/// Field handles of the posts index
#[derive(Debug, Clone)]
pub struct PostFields {
    pub id: Field,
    pub team_id: Field,
    pub channel_id: Field,
    pub user_id: Field,
    pub create_at: Field,
    pub message: Field,
    pub post_type: Field,
    pub hashtags: Field,
    pub attachments: Field,
}

impl PostFields {
    pub fn new(schema: &Schema) -> Result<Self> {
        Ok(Self {
            id: resolve(schema, post::ID)?,
            team_id: resolve(schema, post::TEAM_ID)?,
            channel_id: resolve(schema, post::CHANNEL_ID)?,
            user_id: resolve(schema, post::USER_ID)?,
            create_at: resolve(schema, post::CREATE_AT)?,
            message: resolve(schema, post::MESSAGE)?,
            post_type: resolve(schema, post::TYPE)?,
            hashtags: resolve(schema, post::HASHTAGS)?,
            attachments: resolve(schema, post::ATTACHMENTS)?,
        })
    }
}

/// Field handles of the users index
#[derive(Debug, Clone)]
pub struct UserFields {
    pub id: Field,
    pub suggestions_with_fullname: Field,
    pub suggestions_without_fullname: Field,
    pub team_ids: Field,
    pub channel_ids: Field,
}

impl UserFields {
    pub fn new(schema: &Schema) -> Result<Self> {
        Ok(Self {
            id: resolve(schema, user::ID)?,
            suggestions_with_fullname: resolve(schema, user::SUGGESTIONS_WITH_FULLNAME)?,
            suggestions_without_fullname: resolve(schema, user::SUGGESTIONS_WITHOUT_FULLNAME)?,
            team_ids: resolve(schema, user::TEAM_IDS)?,
            channel_ids: resolve(schema, user::CHANNEL_IDS)?,
        })
    }
}

/// Field handles of the channels index
#[derive(Debug, Clone)]
pub struct ChannelFields {
    pub id: Field,
    pub team_id: Field,
    pub name_suggest: Field,
}

impl ChannelFields {
    pub fn new(schema: &Schema) -> Result<Self> {
        Ok(Self {
            id: resolve(schema, channel::ID)?,
            team_id: resolve(schema, channel::TEAM_ID)?,
            name_suggest: resolve(schema, channel::NAME_SUGGEST)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::schema::FieldType;

    #[test]
    fn test_every_table_builds_a_schema() {
        for kind in IndexKind::ALL {
            let schema = build_schema(kind);
            for spec in kind.fields() {
                assert!(schema.get_field(spec.name).is_ok(), "{} missing {}", kind, spec.name);
            }
            assert!(schema.get_field(kind.id_field()).is_ok());
        }
    }

    #[test]
    fn test_field_handles_resolve() {
        assert!(PostFields::new(&build_schema(IndexKind::Posts)).is_ok());
        assert!(UserFields::new(&build_schema(IndexKind::Users)).is_ok());
        assert!(ChannelFields::new(&build_schema(IndexKind::Channels)).is_ok());
    }

    #[test]
    fn test_field_handles_fail_on_wrong_schema() {
        assert!(PostFields::new(&build_schema(IndexKind::Channels)).is_err());
    }

    #[test]
    fn test_field_kinds_map_to_tantivy_types() {
        let schema = build_schema(IndexKind::Posts);

        let create_at = schema.get_field_entry(schema.get_field(post::CREATE_AT).unwrap());
        assert!(matches!(create_at.field_type(), FieldType::F64(_)));
        assert!(create_at.is_fast());

        let channel_id = schema.get_field_entry(schema.get_field(post::CHANNEL_ID).unwrap());
        match channel_id.field_type() {
            FieldType::Str(opts) => {
                let indexing = opts.get_indexing_options().unwrap();
                assert_eq!(indexing.tokenizer(), "raw");
            }
            other => panic!("unexpected field type {:?}", other),
        }

        let message = schema.get_field_entry(schema.get_field(post::MESSAGE).unwrap());
        match message.field_type() {
            FieldType::Str(opts) => {
                let indexing = opts.get_indexing_options().unwrap();
                assert_eq!(indexing.tokenizer(), "default");
            }
            other => panic!("unexpected field type {:?}", other),
        }
    }

    #[test]
    fn test_field_kind_lookup() {
        assert_eq!(field_kind(IndexKind::Posts, post::MESSAGE), Some(FieldKind::Text));
        assert_eq!(field_kind(IndexKind::Users, user::TEAM_IDS), Some(FieldKind::Keyword));
        assert_eq!(field_kind(IndexKind::Channels, "missing"), None);
    }
}
