use std::sync::Arc;

use tracing::debug;

use crate::{
    domain::{FetchOutcome, MentionId, RefreshTarget},
    ports::RenderRefresh,
    resolver::ProfileResolver,
};

/// What one pass over one visible unit did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempts: Vec<(MentionId, FetchOutcome)>,
    /// Stopped early on a rate limit.
    pub aborted: bool,
}

impl BatchReport {
    pub fn attempted(&self) -> Vec<&MentionId> {
        self.attempts.iter().map(|(id, _)| id).collect()
    }
}

/// Runs the resolver over a list of ids, one at a time.
pub struct BatchProcessor {
    resolver: Arc<ProfileResolver>,
    refresh: Arc<dyn RenderRefresh>,
}

impl BatchProcessor {
    pub fn new(resolver: Arc<ProfileResolver>, refresh: Arc<dyn RenderRefresh>) -> Self {
        Self { resolver, refresh }
    }

    /// Resolve `ids` in order, refreshing `target` after each attempt.
    ///
    /// An empty list still refreshes once so a pending loading state clears.
    /// A rate-limited attempt ends the pass; later ids are left for the next hover.
    pub async fn process(&self, ids: &[MentionId], target: &RefreshTarget) -> BatchReport {
        let mut report = BatchReport::default();

        if ids.is_empty() {
            self.refresh.refresh(target);
            return report;
        }

        for id in ids {
            let outcome = self.resolver.resolve(id).await;
            let stop = outcome.is_rate_limited();
            report.attempts.push((id.clone(), outcome));
            self.refresh.refresh(target);

            if stop {
                debug!(user = %id, skipped = ids.len() - report.attempts.len(), "batch aborted");
                report.aborted = true;
                break;
            }
        }

        report
    }
}
