//! Wire model for the profile service and the host's visible units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChannelId, MentionId, MessageId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    pub fn mention_id(&self) -> MentionId {
        MentionId(self.id.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub joined_at: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub accent_color: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberProfile {
    pub guild_id: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub accent_color: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAccount {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub verified: bool,
}

/// Response of the guild-scoped profile endpoint.
///
/// `guild_member` is absent when the requested user is not in that guild.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user: User,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
    #[serde(default)]
    pub guild_member: Option<GuildMember>,
    #[serde(default)]
    pub guild_member_profile: Option<GuildMemberProfile>,
    #[serde(default)]
    pub connected_accounts: Vec<ConnectedAccount>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    #[serde(default)]
    pub raw_value: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub raw_description: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<EmbedField>>,
}

/// A rendered message as the host sees it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
}

impl MessageView {
    /// Whole seconds of the last edit, or of creation for unedited messages.
    pub fn revision(&self) -> i64 {
        self.edited_timestamp.unwrap_or(self.timestamp).timestamp()
    }
}

/// A channel topic header as the host sees it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicView {
    pub channel_id: ChannelId,
    #[serde(default)]
    pub topic: Option<String>,
}
