use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    batch::{BatchProcessor, BatchReport},
    cache::ResolutionCache,
    config::EngineConfig,
    domain::{Lookup, MentionId, RefreshTarget, SessionKey},
    extract::{extract_mentions, message_fragments, topic_fragments},
    model::{MessageView, TopicView},
    ports::{GuildContext, ProfileApi, RenderRefresh, UserStore},
    resolver::ProfileResolver,
    sessions::SessionTracker,
};

/// Everything the engine needs from its host.
#[derive(Clone)]
pub struct EnginePorts {
    pub api: Arc<dyn ProfileApi>,
    pub store: Arc<dyn UserStore>,
    pub guilds: Arc<dyn GuildContext>,
    pub refresh: Arc<dyn RenderRefresh>,
}

/// Process-scoped owner of the cache, resolver and session state.
///
/// Hosts wire their hover callbacks to the `enter_*`/`leave_*` methods.
pub struct MentionEngine {
    cache: Arc<ResolutionCache>,
    resolver: Arc<ProfileResolver>,
    sessions: SessionTracker,
    batch: BatchProcessor,
    guilds: Arc<dyn GuildContext>,
    refresh: Arc<dyn RenderRefresh>,
    installed: AtomicBool,
}

impl MentionEngine {
    pub fn install(ports: EnginePorts, cfg: EngineConfig) -> Arc<Self> {
        let cache = Arc::new(ResolutionCache::new(ports.store));
        let resolver = Arc::new(ProfileResolver::new(
            ports.api,
            cache.clone(),
            ports.guilds.clone(),
            cfg,
        ));
        let batch = BatchProcessor::new(resolver.clone(), ports.refresh.clone());

        info!(
            policy = ?cfg.unknown_error_policy,
            honor_retry_after = cfg.honor_retry_after,
            "mention engine installed"
        );

        Arc::new(Self {
            cache,
            resolver,
            sessions: SessionTracker::new(),
            batch,
            guilds: ports.guilds,
            refresh: ports.refresh,
            installed: AtomicBool::new(true),
        })
    }

    /// Stop reacting to hover events and drop all engine-owned state.
    ///
    /// Passes already running finish on their own.
    pub fn uninstall(&self) {
        if !self.installed.swap(false, Ordering::SeqCst) {
            return;
        }
        self.sessions.clear();
        self.cache.reset();
        self.resolver.reset();
        info!("mention engine uninstalled");
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    pub fn resolver(&self) -> &ProfileResolver {
        &self.resolver
    }

    /// Mentions in `fragments` that still need a fetch under the current guild.
    pub fn pending_mentions<S: AsRef<str>>(&self, fragments: &[S]) -> Vec<MentionId> {
        let guild = self.guilds.current_guild();
        extract_mentions(fragments)
            .into_iter()
            .filter(|id| !self.cache.is_resolved(id, guild.as_ref(), Lookup::Member))
            .collect()
    }

    /// Hover-enter on a message. `None` if a pass for this revision is already running.
    pub async fn enter_message(&self, message: &MessageView) -> Option<BatchReport> {
        self.run_session(
            message_key(message),
            &message_fragments(message),
            RefreshTarget::Message(message.id.clone()),
        )
        .await
    }

    /// Hover-leave on a message. Refreshes it if a pass was being tracked.
    pub fn leave_message(&self, message: &MessageView) -> bool {
        self.end_session(
            &message_key(message),
            &RefreshTarget::Message(message.id.clone()),
        )
    }

    /// A topic header became visible.
    pub async fn enter_topic(&self, topic: &TopicView) -> Option<BatchReport> {
        self.run_session(
            topic_key(topic),
            &topic_fragments(topic),
            RefreshTarget::Topic(topic.channel_id.clone()),
        )
        .await
    }

    pub fn leave_topic(&self, topic: &TopicView) -> bool {
        self.end_session(
            &topic_key(topic),
            &RefreshTarget::Topic(topic.channel_id.clone()),
        )
    }

    /// Fire-and-forget variant of [`Self::enter_message`] for synchronous host callbacks.
    pub fn spawn_enter_message(
        self: &Arc<Self>,
        message: MessageView,
    ) -> JoinHandle<Option<BatchReport>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.enter_message(&message).await })
    }

    pub fn spawn_enter_topic(
        self: &Arc<Self>,
        topic: TopicView,
    ) -> JoinHandle<Option<BatchReport>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.enter_topic(&topic).await })
    }

    async fn run_session(
        &self,
        key: SessionKey,
        fragments: &[&str],
        target: RefreshTarget,
    ) -> Option<BatchReport> {
        if !self.is_installed() || !self.sessions.enter(&key) {
            return None;
        }

        let ids = self.pending_mentions(fragments);
        debug!(session = %key, pending = ids.len(), "resolving mentions");
        let report = self.batch.process(&ids, &target).await;
        self.sessions.leave(&key);
        Some(report)
    }

    fn end_session(&self, key: &SessionKey, target: &RefreshTarget) -> bool {
        if !self.sessions.leave(key) {
            return false;
        }
        self.refresh.refresh(target);
        true
    }
}

pub fn message_key(message: &MessageView) -> SessionKey {
    SessionKey::Message {
        message_id: message.id.clone(),
        revision: message.revision(),
    }
}

pub fn topic_key(topic: &TopicView) -> SessionKey {
    SessionKey::Topic {
        channel_id: topic.channel_id.clone(),
        topic: topic.topic.clone().unwrap_or_default(),
    }
}
