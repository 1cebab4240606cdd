//! Channel model

use serde::{Deserialize, Serialize};

/// A channel within a team
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub team_id: String,
    /// URL-safe handle, e.g. "town-square"
    pub name: String,
    /// Human readable name, e.g. "Town Square"
    #[serde(default)]
    pub display_name: String,
}

impl Channel {
    pub fn new(
        id: impl Into<String>,
        team_id: impl Into<String>,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            team_id: team_id.into(),
            name: name.into(),
            display_name: display_name.into(),
        }
    }
}
