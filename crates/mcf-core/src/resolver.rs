use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    cache::ResolutionCache,
    config::{EngineConfig, UnknownErrorPolicy},
    domain::{FetchOutcome, GuildId, GuildScope, Lookup, MentionId},
    ports::{ApiError, ErrorKind, GuildContext, ProfileApi},
    store::StoreEvent,
};

/// Longest retry-after window the resolver will honour.
const MAX_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// Where a single id is in its fetch sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attempt {
    /// Rich, guild-scoped profile.
    Initial,
    /// Plain user lookup after the profile was forbidden.
    Fallback,
}

/// Fetches missing user/member data and records what was resolved.
///
/// Per id the sequence is `Initial -> (403) -> Fallback -> done`; a 429 at any
/// point ends it without touching the cache.
pub struct ProfileResolver {
    api: Arc<dyn ProfileApi>,
    cache: Arc<ResolutionCache>,
    guilds: Arc<dyn GuildContext>,
    cfg: EngineConfig,
    forbidden: Mutex<HashSet<MentionId>>,
    cooldown_until: Mutex<Option<Instant>>,
}

impl ProfileResolver {
    pub fn new(
        api: Arc<dyn ProfileApi>,
        cache: Arc<ResolutionCache>,
        guilds: Arc<dyn GuildContext>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            api,
            cache,
            guilds,
            cfg,
            forbidden: Mutex::new(HashSet::new()),
            cooldown_until: Mutex::new(None),
        }
    }

    /// Resolve one id under the current guild.
    ///
    /// Never returns [`FetchOutcome::PermissionDenied`]: a forbidden profile
    /// always moves on to the fallback lookup.
    pub async fn resolve(&self, id: &MentionId) -> FetchOutcome {
        let Some(guild) = self.guilds.current_guild() else {
            return FetchOutcome::Resolved(GuildScope::Global);
        };

        if self.cache.is_resolved(id, Some(&guild), Lookup::Member) {
            debug!(user = %id, guild = %guild, "already resolved");
            return FetchOutcome::Resolved(GuildScope::Guild(guild));
        }

        let mut attempt = if self.was_forbidden(id) {
            Attempt::Fallback
        } else {
            Attempt::Initial
        };

        loop {
            let outcome = match attempt {
                Attempt::Initial => self.fetch_member(id, &guild).await,
                Attempt::Fallback => self.fetch_user(id, &guild).await,
            };

            match (attempt, outcome) {
                (Attempt::Initial, FetchOutcome::PermissionDenied) => {
                    debug!(user = %id, guild = %guild, "profile forbidden, falling back to user lookup");
                    self.remember_forbidden(id);
                    attempt = Attempt::Fallback;
                }
                (_, outcome) => return outcome,
            }
        }
    }

    /// Remaining retry-after window, if a 429 is still being honoured.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let until = (*self.cooldown_until.lock().unwrap_or_else(|e| e.into_inner()))?;
        let now = Instant::now();
        (until > now).then(|| until - now)
    }

    async fn fetch_member(&self, id: &MentionId, guild: &GuildId) -> FetchOutcome {
        if self.cooldown_remaining().is_some() {
            return FetchOutcome::RateLimited;
        }

        match self.api.fetch_member_profile(id, guild).await {
            Ok(profile) => {
                let store = self.cache.store();
                store.dispatch(StoreEvent::UserUpdate {
                    user: profile.user,
                });

                let scope = match profile.guild_member {
                    Some(guild_member) => {
                        store.dispatch(StoreEvent::GuildMemberProfileUpdate {
                            guild_id: guild.clone(),
                            guild_member,
                        });
                        GuildScope::Guild(guild.clone())
                    }
                    // Not a member: what we got is guild-independent.
                    None => GuildScope::Global,
                };

                self.cache.mark_resolved(id, scope.clone());
                FetchOutcome::Resolved(scope)
            }
            Err(e) => self.on_error(id, Attempt::Initial, e),
        }
    }

    async fn fetch_user(&self, id: &MentionId, guild: &GuildId) -> FetchOutcome {
        if self.cache.is_resolved(id, Some(guild), Lookup::UserOnly) {
            self.cache.mark_resolved(id, GuildScope::Global);
            return FetchOutcome::Resolved(GuildScope::Global);
        }

        if self.cooldown_remaining().is_some() {
            return FetchOutcome::RateLimited;
        }

        match self.api.fetch_user(id).await {
            Ok(user) => {
                self.cache.store().dispatch(StoreEvent::UserUpdate { user });
                self.cache.mark_resolved(id, GuildScope::Global);
                FetchOutcome::Resolved(GuildScope::Global)
            }
            Err(e) => self.on_error(id, Attempt::Fallback, e),
        }
    }

    fn on_error(&self, id: &MentionId, attempt: Attempt, err: ApiError) -> FetchOutcome {
        match (err.kind(), attempt) {
            (ErrorKind::RateLimited, _) => {
                warn!(user = %id, retry_after = ?err.retry_after(), "aborted fetching user due to rate limit");
                if self.cfg.honor_retry_after {
                    if let Some(wait) = err.retry_after() {
                        self.extend_cooldown(wait);
                    }
                }
                FetchOutcome::RateLimited
            }
            (ErrorKind::Forbidden, Attempt::Initial) => FetchOutcome::PermissionDenied,
            (ErrorKind::Forbidden, Attempt::Fallback) => {
                debug!(user = %id, "user lookup forbidden, giving up");
                self.cache.mark_resolved(id, GuildScope::Global);
                FetchOutcome::ResolvedWithoutScope
            }
            (ErrorKind::Unknown, _) => match self.cfg.unknown_error_policy {
                UnknownErrorPolicy::FailOpen => {
                    warn!(user = %id, error = %err, "fetch failed, caching as attempted");
                    self.cache.mark_resolved(id, GuildScope::Global);
                    FetchOutcome::ResolvedWithoutScope
                }
                UnknownErrorPolicy::LeaveUnresolved => {
                    warn!(user = %id, error = %err, "fetch failed, leaving unresolved");
                    FetchOutcome::Unresolved
                }
            },
        }
    }

    fn was_forbidden(&self, id: &MentionId) -> bool {
        self.forbidden
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    fn remember_forbidden(&self, id: &MentionId) {
        self.forbidden
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone());
    }

    fn extend_cooldown(&self, wait: Duration) {
        let now = Instant::now();
        let until = now
            .checked_add(wait.min(MAX_COOLDOWN))
            .unwrap_or(now);
        let mut slot = self.cooldown_until.lock().unwrap_or_else(|e| e.into_inner());
        if slot.map_or(true, |current| current < until) {
            *slot = Some(until);
        }
    }

    pub(crate) fn reset(&self) {
        self.forbidden
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        *self.cooldown_until.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{StaticGuildContext, UserStore};
    use crate::store::MemoryUserStore;
    use crate::testing::{member, profile, user, Call, FakeApi};

    struct Fixture {
        api: Arc<FakeApi>,
        store: Arc<MemoryUserStore>,
        cache: Arc<ResolutionCache>,
        guilds: Arc<StaticGuildContext>,
        resolver: ProfileResolver,
    }

    fn fixture(cfg: EngineConfig) -> Fixture {
        let api = Arc::new(FakeApi::default());
        let store = Arc::new(MemoryUserStore::new());
        let cache = Arc::new(ResolutionCache::new(store.clone()));
        let guilds = Arc::new(StaticGuildContext::new(Some(GuildId::from("g"))));
        let resolver = ProfileResolver::new(api.clone(), cache.clone(), guilds.clone(), cfg);
        Fixture {
            api,
            store,
            cache,
            guilds,
            resolver,
        }
    }

    fn g() -> GuildId {
        GuildId::from("g")
    }

    #[tokio::test]
    async fn member_profile_success_marks_guild_scope() {
        let f = fixture(EngineConfig::default());
        let id = MentionId::from("1");
        f.api
            .on_profile("1", Ok(profile("1", Some(member("1", Some("nick"))))));

        let out = f.resolver.resolve(&id).await;

        assert_eq!(out, FetchOutcome::Resolved(GuildScope::Guild(g())));
        assert!(f.store.has_member(&g(), &id));
        assert!(f.cache.is_resolved(&id, Some(&g()), Lookup::Member));
        assert!(!f
            .cache
            .is_resolved(&id, Some(&GuildId::from("other")), Lookup::Member));
    }

    #[tokio::test]
    async fn profile_without_membership_marks_global() {
        let f = fixture(EngineConfig::default());
        let id = MentionId::from("1");
        f.api.on_profile("1", Ok(profile("1", None)));

        let out = f.resolver.resolve(&id).await;

        assert_eq!(out, FetchOutcome::Resolved(GuildScope::Global));
        assert!(f.store.has_user(&id));
        assert!(!f.store.has_member(&g(), &id));
        assert!(f
            .cache
            .is_resolved(&id, Some(&GuildId::from("other")), Lookup::Member));
    }

    #[tokio::test]
    async fn already_resolved_ids_never_hit_the_network() {
        let f = fixture(EngineConfig::default());
        let id = MentionId::from("1");
        f.store.dispatch(StoreEvent::GuildMemberProfileUpdate {
            guild_id: g(),
            guild_member: member("1", None),
        });

        let out = f.resolver.resolve(&id).await;

        assert_eq!(out, FetchOutcome::Resolved(GuildScope::Guild(g())));
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test]
    async fn no_guild_context_is_a_no_op() {
        let f = fixture(EngineConfig::default());
        f.guilds.set(None);

        let out = f.resolver.resolve(&MentionId::from("1")).await;

        assert_eq!(out, FetchOutcome::Resolved(GuildScope::Global));
        assert!(f.api.calls().is_empty());
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn forbidden_profile_falls_back_to_user_lookup() {
        let f = fixture(EngineConfig::default());
        let id = MentionId::from("1");
        f.api.on_profile("1", Err(ApiError::Forbidden));
        f.api.on_user("1", Ok(user("1")));

        let out = f.resolver.resolve(&id).await;

        assert_eq!(out, FetchOutcome::Resolved(GuildScope::Global));
        assert_eq!(
            f.api.calls(),
            vec![Call::Profile("1".into()), Call::User("1".into())]
        );
        assert!(f.store.has_user(&id));
    }

    #[tokio::test]
    async fn double_forbidden_fails_open_after_exactly_two_calls() {
        let f = fixture(EngineConfig::default());
        let id = MentionId::from("1");
        f.api.on_profile("1", Err(ApiError::Forbidden));
        f.api.on_user("1", Err(ApiError::Forbidden));

        let out = f.resolver.resolve(&id).await;
        assert_eq!(out, FetchOutcome::ResolvedWithoutScope);
        assert_eq!(f.api.calls().len(), 2);
        assert!(f.cache.is_resolved(&id, Some(&g()), Lookup::Member));

        // Cached: a second hover costs nothing.
        let again = f.resolver.resolve(&id).await;
        assert_eq!(again, FetchOutcome::Resolved(GuildScope::Guild(g())));
        assert_eq!(f.api.calls().len(), 2);
    }

    #[tokio::test]
    async fn forbidden_ids_skip_straight_to_fallback_next_time() {
        let f = fixture(EngineConfig {
            honor_retry_after: false,
            ..EngineConfig::default()
        });
        let id = MentionId::from("1");
        f.api.on_profile("1", Err(ApiError::Forbidden));
        f.api.on_user(
            "1",
            Err(ApiError::RateLimited {
                retry_after: Some(Duration::from_secs(1)),
            }),
        );

        assert_eq!(f.resolver.resolve(&id).await, FetchOutcome::RateLimited);

        f.api.on_user("1", Ok(user("1")));
        assert_eq!(
            f.resolver.resolve(&id).await,
            FetchOutcome::Resolved(GuildScope::Global)
        );
        assert_eq!(
            f.api.calls(),
            vec![
                Call::Profile("1".into()),
                Call::User("1".into()),
                Call::User("1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn rate_limit_leaves_id_unresolved() {
        let f = fixture(EngineConfig::default());
        let id = MentionId::from("1");
        f.api
            .on_profile("1", Err(ApiError::RateLimited { retry_after: None }));

        assert_eq!(f.resolver.resolve(&id).await, FetchOutcome::RateLimited);
        assert!(f.cache.is_empty());
        assert!(!f.cache.is_resolved(&id, Some(&g()), Lookup::Member));
        assert_eq!(f.resolver.cooldown_remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_suppresses_requests_until_it_elapses() {
        let f = fixture(EngineConfig::default());
        f.api.on_profile(
            "1",
            Err(ApiError::RateLimited {
                retry_after: Some(Duration::from_secs(5)),
            }),
        );
        f.api.on_profile("2", Ok(profile("2", None)));

        assert_eq!(
            f.resolver.resolve(&MentionId::from("1")).await,
            FetchOutcome::RateLimited
        );
        assert!(f.resolver.cooldown_remaining().is_some());

        // Inside the window: refused locally.
        assert_eq!(
            f.resolver.resolve(&MentionId::from("2")).await,
            FetchOutcome::RateLimited
        );
        assert_eq!(f.api.calls().len(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(
            f.resolver.resolve(&MentionId::from("2")).await,
            FetchOutcome::Resolved(GuildScope::Global)
        );
        assert_eq!(f.api.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_retry_after_is_capped() {
        let f = fixture(EngineConfig::default());
        f.api.on_profile(
            "1",
            Err(ApiError::RateLimited {
                retry_after: Some(Duration::from_secs(u64::MAX / 2)),
            }),
        );

        assert_eq!(
            f.resolver.resolve(&MentionId::from("1")).await,
            FetchOutcome::RateLimited
        );
        let remaining = f.resolver.cooldown_remaining().unwrap();
        assert!(remaining <= MAX_COOLDOWN);

        tokio::time::advance(MAX_COOLDOWN + Duration::from_secs(1)).await;
        assert_eq!(f.resolver.cooldown_remaining(), None);
    }

    #[tokio::test]
    async fn unknown_error_fails_open_by_default() {
        let f = fixture(EngineConfig::default());
        let id = MentionId::from("1");
        f.api.on_profile(
            "1",
            Err(ApiError::Status {
                status: 500,
                message: "boom".to_string(),
            }),
        );

        assert_eq!(
            f.resolver.resolve(&id).await,
            FetchOutcome::ResolvedWithoutScope
        );
        assert!(f.cache.is_resolved(&id, Some(&g()), Lookup::Member));
        assert_eq!(f.api.calls().len(), 1);
    }

    #[tokio::test]
    async fn leave_unresolved_policy_allows_a_later_retry() {
        let f = fixture(EngineConfig {
            unknown_error_policy: UnknownErrorPolicy::LeaveUnresolved,
            ..EngineConfig::default()
        });
        let id = MentionId::from("1");
        f.api
            .on_profile("1", Err(ApiError::Transport("reset".to_string())));

        assert_eq!(f.resolver.resolve(&id).await, FetchOutcome::Unresolved);
        assert!(f.cache.is_empty());

        f.api.on_profile("1", Ok(profile("1", None)));
        assert_eq!(
            f.resolver.resolve(&id).await,
            FetchOutcome::Resolved(GuildScope::Global)
        );
        assert_eq!(f.api.calls().len(), 2);
    }

    #[tokio::test]
    async fn fallback_uses_store_user_without_fetching() {
        let f = fixture(EngineConfig::default());
        let id = MentionId::from("1");
        f.store.dispatch(StoreEvent::UserUpdate { user: user("1") });
        f.api.on_profile("1", Err(ApiError::Forbidden));

        let out = f.resolver.resolve(&id).await;

        assert_eq!(out, FetchOutcome::Resolved(GuildScope::Global));
        assert_eq!(f.api.calls(), vec![Call::Profile("1".into())]);
    }
}
