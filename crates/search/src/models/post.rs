//! Post model: a single chat message

use serde::{Deserialize, Serialize};

/// A rich attachment carried in a post's props
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub pretext: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub fallback: String,
}

impl Attachment {
    /// Searchable text of the attachment, empty parts dropped
    pub fn searchable_text(&self) -> String {
        [&self.pretext, &self.title, &self.text, &self.fallback]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A message posted to a channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Post ID
    pub id: String,
    /// Channel the post belongs to
    pub channel_id: String,
    /// Author
    pub user_id: String,
    /// Creation time in milliseconds since the epoch
    pub create_at: i64,
    /// Message body
    pub message: String,
    /// Post type tag (empty for regular posts, e.g. "system_join_channel")
    #[serde(default, rename = "type")]
    pub post_type: String,
    /// Space-separated hashtags extracted from the message
    #[serde(default)]
    pub hashtags: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Post {
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        create_at: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            create_at,
            message: message.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_text_skips_empty_parts() {
        let attachment = Attachment {
            pretext: "".to_string(),
            title: "Build failed".to_string(),
            text: "  ".to_string(),
            fallback: "CI build #42 failed".to_string(),
        };
        assert_eq!(attachment.searchable_text(), "Build failed\nCI build #42 failed");
    }

    #[test]
    fn test_post_type_serializes_as_type() {
        let mut post = Post::new("p1", "c1", "u1", 1, "hello");
        post.post_type = "system_join_channel".to_string();

        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["type"], "system_join_channel");
    }
}
