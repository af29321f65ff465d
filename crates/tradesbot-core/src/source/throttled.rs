use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChannelId, MessageId, RawMessage},
    ports::MessageSource,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* history requests (global rate limit).
    pub global_min_interval: Duration,
    /// Minimum spacing between requests for the same channel (per-route limit).
    pub per_channel_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        // Discord allows ~50 req/s globally and 5 req/5s per route for history.
        Self {
            global_min_interval: Duration::from_millis(25),
            per_channel_min_interval: Duration::from_millis(250),
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

/// MessageSource decorator that spaces out upstream calls.
///
/// Channel workers share one `ThrottledSource`, so the global limiter bounds
/// the combined request rate of the whole worker pool.
pub struct ThrottledSource {
    inner: Arc<dyn MessageSource>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_channel: Mutex<HashMap<ChannelId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledSource {
    pub fn new(inner: Arc<dyn MessageSource>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_channel: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_channel(&self, channel_id: &ChannelId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_channel.lock().await;
        map.entry(channel_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_channel_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle(&self, channel_id: &ChannelId) {
        let global_wait = { self.global.lock().await.reserve() };
        let channel_wait = {
            let lim = self.limiter_for_channel(channel_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(channel_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl MessageSource for ThrottledSource {
    async fn list_messages_before(
        &self,
        channel_id: &ChannelId,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<RawMessage>> {
        self.throttle(channel_id).await;
        self.inner
            .list_messages_before(channel_id, before, limit)
            .await
    }

    async fn resolve_channels(
        &self,
        channel_id: &ChannelId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChannelId>> {
        self.throttle(channel_id).await;
        self.inner.resolve_channels(channel_id, since).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MessageSource for CountingSource {
        async fn list_messages_before(
            &self,
            _channel_id: &ChannelId,
            _before: Option<&MessageId>,
            _limit: usize,
        ) -> Result<Vec<RawMessage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn resolve_channels(
            &self,
            channel_id: &ChannelId,
            _since: DateTime<Utc>,
        ) -> Result<Vec<ChannelId>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ChannelId(format!("{channel_id}-thread"))])
        }
    }

    #[test]
    fn limiter_reserves_consecutive_slots() {
        let mut lim = IntervalLimiter::new(Duration::from_secs(10));
        assert!(lim.reserve().is_zero());
        let second = lim.reserve();
        assert!(second > Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_calls_on_the_same_channel() {
        let inner = Arc::new(CountingSource::default());
        let source = ThrottledSource::new(
            inner.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(0),
                per_channel_min_interval: Duration::from_millis(200),
            },
        );
        let ch = ChannelId("c1".to_string());

        let start = Instant::now();
        source.list_messages_before(&ch, None, 10).await.unwrap();
        source.list_messages_before(&ch, None, 10).await.unwrap();
        source.list_messages_before(&ch, None, 10).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_is_forwarded_and_throttled() {
        let inner = Arc::new(CountingSource::default());
        let source = ThrottledSource::new(
            inner.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(0),
                per_channel_min_interval: Duration::from_millis(200),
            },
        );
        let ch = ChannelId("forum".to_string());

        let start = Instant::now();
        let resolved = source.resolve_channels(&ch, Utc::now()).await.unwrap();
        source.list_messages_before(&ch, None, 10).await.unwrap();

        assert_eq!(resolved, vec![ChannelId("forum-thread".to_string())]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
