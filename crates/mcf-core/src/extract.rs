//! Mention extraction from message and topic text.

use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;

use crate::{
    domain::MentionId,
    model::{MessageView, TopicView},
};

static MENTION_RE: OnceLock<Regex> = OnceLock::new();

fn mention_re() -> &'static Regex {
    MENTION_RE.get_or_init(|| Regex::new(r"<@!?([0-9]+)>").expect("valid regex"))
}

/// Extract user mention ids from `fragments` joined by a single space.
///
/// The result is de-duplicated, keeping first-seen order.
pub fn extract_mentions<S: AsRef<str>>(fragments: &[S]) -> Vec<MentionId> {
    let text = fragments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" ");

    let mut seen = HashSet::new();
    mention_re()
        .captures_iter(&text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|id| seen.insert(*id))
        .map(MentionId::from)
        .collect()
}

/// Message content, then each embed's description and field values.
///
/// Absent descriptions contribute an empty fragment; absent field lists and
/// absent field values are skipped.
pub fn message_fragments(message: &MessageView) -> Vec<&str> {
    let mut out = vec![message.content.as_str()];
    for embed in &message.embeds {
        out.push(embed.raw_description.as_deref().unwrap_or(""));
        if let Some(fields) = &embed.fields {
            out.extend(fields.iter().filter_map(|f| f.raw_value.as_deref()));
        }
    }
    out
}

pub fn topic_fragments(topic: &TopicView) -> Vec<&str> {
    topic.topic.as_deref().into_iter().collect()
}
