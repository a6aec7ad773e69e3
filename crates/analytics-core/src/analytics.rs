use std::sync::{Arc, Weak};

use chrono::Utc;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use reqwest::Method;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::buffer::{PointInTime, StatsBuffer};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::events::CustomEvent;
use crate::http::{ApiEndpoint, RetryingHttpClient};
use crate::snapshot::{StatsPayload, StatsSnapshot};
use crate::source::{self, BotSource, LocalShard, ShardAggregator};
use crate::types::{InteractionDescriptor, MemberBuckets, UserType};

/// Version reported to the API during registration.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready { bot_id: String },
}

#[derive(Debug, Serialize)]
struct RegistrationBody<'a> {
    username: &'a str,
    avatar: Option<&'a str>,
    framework: &'a str,
    version: &'a str,
    team: &'a [String],
}

pub(crate) struct Inner {
    pub(crate) config: AnalyticsConfig,
    pub(crate) client: RetryingHttpClient,
    pub(crate) buffer: Mutex<StatsBuffer>,
    source: Arc<dyn BotSource>,
    shards: Arc<dyn ShardAggregator>,
    state: Mutex<LifecycleState>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    pub(crate) fn bot_id(&self) -> Option<String> {
        match &*self.state.lock() {
            LifecycleState::Ready { bot_id } => Some(bot_id.clone()),
            _ => None,
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

/// Resets the state to `Uninitialized` unless the registration completed.
struct InitGuard<'a> {
    state: &'a Mutex<LifecycleState>,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.state.lock() = LifecycleState::Uninitialized;
        }
    }
}

/// Holds a swapped-out snapshot while it is in flight and puts it back into
/// the buffer unless delivery is confirmed.
struct PendingFlush<'a> {
    buffer: &'a Mutex<StatsBuffer>,
    snapshot: Option<StatsSnapshot>,
}

impl PendingFlush<'_> {
    fn delivered(mut self) {
        self.snapshot = None;
    }
}

impl Drop for PendingFlush<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.buffer.lock().restore(snapshot);
        }
    }
}

/// Analytics client embedded in a bot.
///
/// Tracking calls fold events into an in-memory buffer; once initialized, a
/// background task flushes the buffer to the collection API on a fixed
/// interval. Cloning is cheap and every clone shares the same buffer.
#[derive(Clone)]
pub struct Analytics {
    inner: Arc<Inner>,
}

impl Analytics {
    /// Creates a client for a bot whose guilds all live in this process.
    pub fn new(config: AnalyticsConfig, source: Arc<dyn BotSource>) -> Result<Self> {
        let shards: Arc<dyn ShardAggregator> = Arc::new(LocalShard::new(Arc::clone(&source)));
        Self::sharded(config, source, shards)
    }

    /// Creates a client whose guild and member totals are summed across shards.
    pub fn sharded(
        config: AnalyticsConfig,
        source: Arc<dyn BotSource>,
        shards: Arc<dyn ShardAggregator>,
    ) -> Result<Self> {
        config.validate()?;
        let client = RetryingHttpClient::new(&config)?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                client,
                buffer: Mutex::new(StatsBuffer::new(Utc::now().date_naive())),
                source,
                shards,
                state: Mutex::new(LifecycleState::Uninitialized),
                timer: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.inner.config
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.lock().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.inner.state.lock(), LifecycleState::Ready { .. })
    }

    /// Registers the bot with the API and starts the recurring flush.
    ///
    /// On failure the client stays uninitialized and no flush is scheduled;
    /// call this again to retry.
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            match &*state {
                LifecycleState::Ready { .. } => {
                    warn!("analytics already initialized, ignoring");
                    return Ok(());
                }
                LifecycleState::Initializing => return Err(AnalyticsError::InstanceNotReady),
                LifecycleState::Uninitialized => *state = LifecycleState::Initializing,
            }
        }
        let mut guard = InitGuard {
            state: &self.inner.state,
            armed: true,
        };

        let identity = self.inner.source.identity();
        let body = RegistrationBody {
            username: &identity.username,
            avatar: identity.avatar.as_deref(),
            framework: &identity.framework,
            version: LIBRARY_VERSION,
            team: &identity.team,
        };
        let endpoint = ApiEndpoint::BotSettings {
            bot_id: identity.id.clone(),
        };

        if let Err(e) = self
            .inner
            .client
            .send(Method::PATCH, &endpoint, Some(&body))
            .await
        {
            error!("analytics initialization failed: {}", e);
            return Err(e);
        }

        guard.armed = false;
        *self.inner.state.lock() = LifecycleState::Ready {
            bot_id: identity.id.clone(),
        };

        let interval = self.inner.config.flush_interval();
        info!(
            "analytics initialized for bot {} (dev mode {}), stats will be sent every {:?}",
            identity.id,
            if self.inner.config.dev_mode { "enabled" } else { "disabled" },
            interval
        );
        self.start_timer();
        Ok(())
    }

    fn start_timer(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.flush_interval();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let analytics = Analytics { inner };
                if let Err(e) = analytics.flush().await {
                    warn!(
                        "analytics data cannot be sent to the API, will try again next tick: {}",
                        e
                    );
                }
            }
        });

        *self.inner.timer.lock() = Some(handle);
    }

    /// Refreshes point-in-time totals and delivers the buffer once.
    ///
    /// The buffer is swapped for a fresh baseline before the request goes out,
    /// so events recorded while it is in flight are kept. If delivery fails,
    /// the swapped-out data is merged back and goes out with the next flush.
    pub async fn flush(&self) -> Result<()> {
        let bot_id = self.inner.bot_id().ok_or(AnalyticsError::InstanceNotReady)?;
        let values = self.point_in_time().await;

        let snapshot = {
            let mut buffer = self.inner.buffer.lock();
            buffer.refresh(values);
            buffer.take_for_flush(Utc::now().date_naive())
        };
        let payload = snapshot.to_payload();
        let pending = PendingFlush {
            buffer: &self.inner.buffer,
            snapshot: Some(snapshot),
        };

        if self.inner.config.debug {
            debug!(
                "[analytics] sending stats: {} interactions, {} guilds, {} users",
                payload.interactions.len(),
                payload.guilds,
                payload.users
            );
        }

        self.inner
            .client
            .send(Method::POST, &ApiEndpoint::BotStats { bot_id }, Some(&payload))
            .await?;

        pending.delivered();
        if self.inner.config.debug {
            debug!("[analytics] stats sent to the API");
        }
        Ok(())
    }

    async fn point_in_time(&self) -> PointInTime {
        let shards = &self.inner.shards;
        PointInTime {
            guilds: shards.aggregate(source::guild_count).await,
            users: shards.aggregate(source::member_count).await,
            guild_members: MemberBuckets {
                tiny: shards.aggregate(source::tiny_guilds).await,
                medium: shards.aggregate(source::medium_guilds).await,
                large: shards.aggregate(source::large_guilds).await,
                huge: shards.aggregate(source::huge_guilds).await,
            },
            user_install_count: self.inner.source.user_install_count().await,
        }
    }

    /// Records an interaction under the name carried by the descriptor.
    pub fn record_interaction(&self, descriptor: &InteractionDescriptor) -> Result<()> {
        self.record_interaction_with(descriptor, |d| d.name.clone())
    }

    /// Records an interaction, naming it with `resolver` (for example to fold
    /// custom ids that embed a user id into one name).
    pub fn record_interaction_with<F>(
        &self,
        descriptor: &InteractionDescriptor,
        resolver: F,
    ) -> Result<()>
    where
        F: FnOnce(&InteractionDescriptor) -> String,
    {
        if !self.is_ready() {
            if self.inner.config.debug {
                debug!(
                    "[analytics] rejected {} interaction: instance not ready",
                    descriptor.kind.as_str()
                );
            }
            return Err(AnalyticsError::InstanceNotReady);
        }

        let name = resolver(descriptor);
        let guilds = self.inner.source.guilds();
        let user_type = self
            .inner
            .buffer
            .lock()
            .record_interaction(descriptor, name.clone(), &guilds, Utc::now());

        if self.inner.config.debug {
            debug!(
                "[analytics] recorded {} '{}' in {} ({:?})",
                descriptor.kind.as_str(),
                name,
                descriptor.guild.as_ref().map_or("dm", |g| g.id.as_str()),
                user_type
            );
        }
        Ok(())
    }

    pub fn record_guild_join(&self) {
        if self.inner.config.debug {
            debug!("[analytics] guild joined");
        }
        self.inner.buffer.lock().record_guild_join();
    }

    pub fn record_guild_leave(&self) {
        if self.inner.config.debug {
            debug!("[analytics] guild left");
        }
        self.inner.buffer.lock().record_guild_leave();
    }

    /// Counts a user type chosen by the application, typically
    /// [`UserType::Other`], which the built-in classifier never assigns.
    pub fn record_user_type(&self, user_type: UserType) {
        self.inner.buffer.lock().record_user_type(user_type);
    }

    /// Handle to an application-defined counter. Custom events survive
    /// flushes.
    pub fn events(&self, key: impl Into<String>) -> Result<CustomEvent> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(AnalyticsError::InvalidValue(
                "event key must not be empty".to_string(),
            ));
        }
        if self.inner.config.debug {
            debug!("[analytics] getting event {}", key);
        }
        Ok(CustomEvent::new(Arc::clone(&self.inner), key))
    }

    /// Copy of the data that has not been delivered yet.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.buffer.lock().snapshot().clone()
    }

    /// The body the next flush would send, without refreshing totals.
    pub fn payload(&self) -> StatsPayload {
        self.inner.buffer.lock().snapshot().to_payload()
    }
}
