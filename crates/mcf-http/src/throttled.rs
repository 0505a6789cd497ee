use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use mcf_core::{
    domain::{GuildId, MentionId},
    model::{Profile, User},
    ports::{ApiError, ProfileApi},
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* two profile requests.
    pub global_min_interval: Duration,
    /// Minimum spacing between member-profile requests for the same guild.
    pub per_guild_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(250),
            per_guild_min_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// ProfileApi decorator that spaces out outbound requests.
///
/// Hover bursts across many messages would otherwise fire profile lookups
/// back to back. This lowers the 429 rate; it does not replace the resolver's
/// rate-limit handling.
pub struct ThrottledProfileApi {
    inner: Arc<dyn ProfileApi>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_guild: Mutex<HashMap<GuildId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledProfileApi {
    pub fn new(inner: Arc<dyn ProfileApi>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_guild: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_guild(&self, guild: &GuildId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_guild.lock().await;
        map.entry(guild.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_guild_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_guild(&self, guild: &GuildId) {
        let global_wait = { self.global.lock().await.reserve() };
        let guild_wait = {
            let lim = self.limiter_for_guild(guild).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(guild_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl ProfileApi for ThrottledProfileApi {
    async fn fetch_user(&self, id: &MentionId) -> Result<User, ApiError> {
        // Not guild-scoped; global spacing only.
        self.throttle_global().await;
        self.inner.fetch_user(id).await
    }

    async fn fetch_member_profile(
        &self,
        id: &MentionId,
        guild: &GuildId,
    ) -> Result<Profile, ApiError> {
        self.throttle_guild(guild).await;
        self.inner.fetch_member_profile(id, guild).await
    }
}
