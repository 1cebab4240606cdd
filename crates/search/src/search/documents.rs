//! Flat, indexable projections of posts, users and channels
//!
//! Mapping is pure: no I/O, no failure. The `id` of every record equals the
//! entity's primary key and is the upsert key in its index.

use serde::{Deserialize, Serialize};
use tantivy::TantivyDocument;
use tantivy::schema::{Field, Value};

use crate::models::{Channel, Post, User};

use super::schema::{ChannelFields, PostFields, UserFields};
use super::suggestions::{extend_unique, split_by, split_by_multiple};

const USERNAME_SEPARATORS: &[&str] = &[".", "-", "_"];
const CHANNEL_NAME_SEPARATORS: &[&str] = &["-", "_"];

/// Indexable projection of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDocument {
    pub id: String,
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    /// Epoch milliseconds, as f64 for range queries
    pub create_at: f64,
    pub message: String,
    pub post_type: String,
    pub hashtags: Vec<String>,
    pub attachments: String,
}

impl PostDocument {
    pub fn from_post(post: &Post, team_id: &str) -> Self {
        let attachments = post
            .attachments
            .iter()
            .map(|a| a.searchable_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            id: post.id.clone(),
            team_id: team_id.to_string(),
            channel_id: post.channel_id.clone(),
            user_id: post.user_id.clone(),
            create_at: post.create_at as f64,
            message: post.message.clone(),
            post_type: post.post_type.clone(),
            hashtags: post.hashtags.split_whitespace().map(str::to_string).collect(),
            attachments,
        }
    }

    pub fn to_document(&self, fields: &PostFields) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_text(fields.id, &self.id);
        doc.add_text(fields.team_id, &self.team_id);
        doc.add_text(fields.channel_id, &self.channel_id);
        doc.add_text(fields.user_id, &self.user_id);
        doc.add_f64(fields.create_at, self.create_at);
        doc.add_text(fields.message, &self.message);
        doc.add_text(fields.post_type, &self.post_type);
        for hashtag in &self.hashtags {
            doc.add_text(fields.hashtags, hashtag);
        }
        if !self.attachments.is_empty() {
            doc.add_text(fields.attachments, &self.attachments);
        }
        doc
    }

    pub fn from_document(doc: &TantivyDocument, fields: &PostFields) -> Self {
        Self {
            id: first_text(doc, fields.id),
            team_id: first_text(doc, fields.team_id),
            channel_id: first_text(doc, fields.channel_id),
            user_id: first_text(doc, fields.user_id),
            create_at: doc
                .get_first(fields.create_at)
                .and_then(|v| v.as_f64())
                .unwrap_or_default(),
            message: first_text(doc, fields.message),
            post_type: first_text(doc, fields.post_type),
            hashtags: all_text(doc, fields.hashtags),
            attachments: first_text(doc, fields.attachments),
        }
    }
}

/// Indexable projection of a user with team and channel membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    pub id: String,
    pub suggestions_with_fullname: Vec<String>,
    pub suggestions_without_fullname: Vec<String>,
    pub team_ids: Vec<String>,
    pub channel_ids: Vec<String>,
}

impl UserDocument {
    /// Project a user; the suggestion set without full names exists so that
    /// autocomplete can honor a "don't show full names" privacy setting
    pub fn from_user(user: &User, team_ids: &[String], channel_ids: &[String]) -> Self {
        let username = split_by_multiple(&user.username.to_lowercase(), USERNAME_SEPARATORS);
        let nickname = split_by(&user.nickname.to_lowercase(), " ");
        let full_name = split_by(&user.full_name().to_lowercase(), " ");

        let mut without_fullname = username;
        extend_unique(&mut without_fullname, nickname);

        let mut with_fullname = without_fullname.clone();
        extend_unique(&mut with_fullname, full_name);

        Self {
            id: user.id.clone(),
            suggestions_with_fullname: with_fullname,
            suggestions_without_fullname: without_fullname,
            team_ids: team_ids.to_vec(),
            channel_ids: channel_ids.to_vec(),
        }
    }

    pub fn to_document(&self, fields: &UserFields) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_text(fields.id, &self.id);
        for s in &self.suggestions_with_fullname {
            doc.add_text(fields.suggestions_with_fullname, s);
        }
        for s in &self.suggestions_without_fullname {
            doc.add_text(fields.suggestions_without_fullname, s);
        }
        for team_id in &self.team_ids {
            doc.add_text(fields.team_ids, team_id);
        }
        for channel_id in &self.channel_ids {
            doc.add_text(fields.channel_ids, channel_id);
        }
        doc
    }

    pub fn from_document(doc: &TantivyDocument, fields: &UserFields) -> Self {
        Self {
            id: first_text(doc, fields.id),
            suggestions_with_fullname: all_text(doc, fields.suggestions_with_fullname),
            suggestions_without_fullname: all_text(doc, fields.suggestions_without_fullname),
            team_ids: all_text(doc, fields.team_ids),
            channel_ids: all_text(doc, fields.channel_ids),
        }
    }
}

/// Indexable projection of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDocument {
    pub id: String,
    pub team_id: String,
    /// Lower-cased suffixes of the display name and the handle
    pub name_suggest: Vec<String>,
}

impl ChannelDocument {
    pub fn from_channel(channel: &Channel) -> Self {
        let mut name_suggest = split_by(&channel.display_name.to_lowercase(), " ");
        extend_unique(
            &mut name_suggest,
            split_by_multiple(&channel.name.to_lowercase(), CHANNEL_NAME_SEPARATORS),
        );

        Self {
            id: channel.id.clone(),
            team_id: channel.team_id.clone(),
            name_suggest,
        }
    }

    pub fn to_document(&self, fields: &ChannelFields) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_text(fields.id, &self.id);
        doc.add_text(fields.team_id, &self.team_id);
        for s in &self.name_suggest {
            doc.add_text(fields.name_suggest, s);
        }
        doc
    }

    pub fn from_document(doc: &TantivyDocument, fields: &ChannelFields) -> Self {
        Self {
            id: first_text(doc, fields.id),
            team_id: first_text(doc, fields.team_id),
            name_suggest: all_text(doc, fields.name_suggest),
        }
    }
}

fn first_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn all_text(doc: &TantivyDocument, field: Field) -> Vec<String> {
    doc.get_all(field)
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attachment;
    use crate::search::schema::{IndexKind, build_schema};

    fn sample_post() -> Post {
        let mut post = Post::new("p1", "C1", "U1", 1_704_412_800_123, "Deploy finished");
        post.post_type = "custom_ci".to_string();
        post.hashtags = "#deploy  #prod".to_string();
        post.attachments = vec![
            Attachment {
                title: "Pipeline".to_string(),
                text: "all green".to_string(),
                ..Default::default()
            },
            Attachment::default(),
        ];
        post
    }

    #[test]
    fn test_post_projection_copies_fields() {
        let doc = PostDocument::from_post(&sample_post(), "T1");
        assert_eq!(doc.id, "p1");
        assert_eq!(doc.team_id, "T1");
        assert_eq!(doc.channel_id, "C1");
        assert_eq!(doc.user_id, "U1");
        assert_eq!(doc.create_at, 1_704_412_800_123.0);
        assert_eq!(doc.post_type, "custom_ci");
        assert_eq!(doc.hashtags, vec!["#deploy", "#prod"]);
        assert_eq!(doc.attachments, "Pipeline\nall green");
    }

    #[test]
    fn test_post_document_round_trip() {
        let fields = PostFields::new(&build_schema(IndexKind::Posts)).unwrap();
        let record = PostDocument::from_post(&sample_post(), "T1");

        let restored = PostDocument::from_document(&record.to_document(&fields), &fields);
        assert_eq!(restored, record);
    }

    #[test]
    fn test_user_suggestions() {
        let user = User::new("u1", "Alice.Smith")
            .with_full_name("Alice", "Smith")
            .with_nickname("Wonder Al");
        let doc = UserDocument::from_user(&user, &["T1".to_string()], &["C1".to_string()]);

        assert_eq!(
            doc.suggestions_without_fullname,
            vec!["alice.smith", ".smith", "smith", "wonder al", "al"]
        );
        assert_eq!(
            doc.suggestions_with_fullname,
            vec!["alice.smith", ".smith", "smith", "wonder al", "al", "alice smith"]
        );
        assert_eq!(doc.team_ids, vec!["T1"]);
        assert_eq!(doc.channel_ids, vec!["C1"]);
    }

    #[test]
    fn test_user_without_names_has_username_only() {
        let doc = UserDocument::from_user(&User::new("u2", "bob"), &[], &[]);
        assert_eq!(doc.suggestions_with_fullname, vec!["bob"]);
        assert_eq!(doc.suggestions_without_fullname, vec!["bob"]);
    }

    #[test]
    fn test_user_document_round_trip_keeps_membership_case() {
        let fields = UserFields::new(&build_schema(IndexKind::Users)).unwrap();
        let user = User::new("UsEr1", "carol");
        let record = UserDocument::from_user(
            &user,
            &["TeamA".to_string(), "TeamB".to_string()],
            &["ChanX".to_string()],
        );

        let restored = UserDocument::from_document(&record.to_document(&fields), &fields);
        assert_eq!(restored, record);
        assert_eq!(restored.id, "UsEr1");
    }

    #[test]
    fn test_channel_name_suggestions_are_lowercase() {
        let channel = Channel::new("c1", "T1", "eng-backend", "Engineering Backend");
        let doc = ChannelDocument::from_channel(&channel);
        assert_eq!(
            doc.name_suggest,
            vec!["engineering backend", "backend", "eng-backend", "-backend"]
        );
    }

    #[test]
    fn test_channel_document_round_trip() {
        let fields = ChannelFields::new(&build_schema(IndexKind::Channels)).unwrap();
        let record = ChannelDocument::from_channel(&Channel::new("C9", "T1", "town-square", "Town Square"));

        let restored = ChannelDocument::from_document(&record.to_document(&fields), &fields);
        assert_eq!(restored, record);
    }
}
