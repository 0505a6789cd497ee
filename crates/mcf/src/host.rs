//! Headless host: visible units arrive as JSON lines on stdin.

use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use tokio::task::JoinSet;

use mcf_core::{
    domain::{ChannelId, GuildId, MentionId, RefreshTarget},
    extract::{extract_mentions, message_fragments, topic_fragments},
    model::{MessageView, TopicView},
    ports::{GuildContext, RenderRefresh, StaticGuildContext, UserStore},
    MentionEngine,
};

/// One line of host input.
///
/// Lines that are not JSON objects are treated as the topic of a synthetic
/// `stdin` channel.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    EnterMessage { message: MessageView },
    LeaveMessage { message: MessageView },
    EnterTopic { topic: TopicView },
    LeaveTopic { topic: TopicView },
    Guild { guild_id: Option<GuildId> },
}

impl HostEvent {
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if !line.starts_with('{') {
            return Ok(Some(HostEvent::EnterTopic {
                topic: TopicView {
                    channel_id: ChannelId::from("stdin"),
                    topic: Some(line.to_string()),
                },
            }));
        }
        let ev = serde_json::from_str(line).context("invalid host event")?;
        Ok(Some(ev))
    }
}

/// Prints refresh requests the way a UI would receive them.
pub struct StdoutRefresh;

impl RenderRefresh for StdoutRefresh {
    fn refresh(&self, target: &RefreshTarget) {
        match target {
            RefreshTarget::Message(id) => println!("refresh message {id}"),
            RefreshTarget::Topic(channel) => println!("refresh topic {channel}"),
        }
    }
}

#[derive(Clone)]
pub struct Host {
    pub engine: Arc<MentionEngine>,
    pub store: Arc<dyn UserStore>,
    pub guilds: Arc<StaticGuildContext>,
}

impl Host {
    /// Enter events run on `tasks` so the input loop keeps reading while a
    /// pass is in flight; a matching leave line can then end its session.
    pub fn handle(&self, event: HostEvent, tasks: &mut JoinSet<()>) {
        match event {
            HostEvent::EnterMessage { message } => {
                let pass = self.engine.spawn_enter_message(message.clone());
                let host = self.clone();
                tasks.spawn(async move {
                    if let Ok(Some(_)) = pass.await {
                        host.print_mentions(&message_fragments(&message));
                    }
                });
            }
            HostEvent::LeaveMessage { message } => {
                self.engine.leave_message(&message);
            }
            HostEvent::EnterTopic { topic } => {
                let pass = self.engine.spawn_enter_topic(topic.clone());
                let host = self.clone();
                tasks.spawn(async move {
                    if let Ok(Some(_)) = pass.await {
                        host.print_mentions(&topic_fragments(&topic));
                    }
                });
            }
            HostEvent::LeaveTopic { topic } => {
                self.engine.leave_topic(&topic);
            }
            HostEvent::Guild { guild_id } => {
                tracing::info!(guild = ?guild_id, "guild context changed");
                self.guilds.set(guild_id);
            }
        }
    }

    fn print_mentions(&self, fragments: &[&str]) {
        let guild = self.guilds.current_guild();
        for id in extract_mentions(fragments) {
            println!("  <@{id}> => {}", self.label(guild.as_ref(), &id));
        }
    }

    fn label(&self, guild: Option<&GuildId>, id: &MentionId) -> String {
        let nick = guild
            .and_then(|g| self.store.member(g, id))
            .and_then(|m| m.nick);
        match (self.store.user(id), nick) {
            (Some(user), Some(nick)) => format!("{nick} ({})", user.username),
            (Some(user), None) => user.global_name.unwrap_or(user.username),
            (None, _) => "unresolved".to_string(),
        }
    }
}
