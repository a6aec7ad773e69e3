use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use reqwest::Method;
use serde::Deserialize;

use crate::analytics::Inner;
use crate::error::Result;
use crate::http::ApiEndpoint;

#[derive(Debug, Deserialize)]
struct EventValue {
    #[serde(default)]
    today_value: u64,
}

/// Application-defined counter, obtained from [`crate::Analytics::events`].
///
/// Values are carried over from one flush to the next instead of being reset.
pub struct CustomEvent {
    inner: Arc<Inner>,
    key: String,
    was_set: Arc<AtomicBool>,
}

impl CustomEvent {
    pub(crate) fn new(inner: Arc<Inner>, key: String) -> Self {
        let event = Self {
            inner,
            key,
            was_set: Arc::new(AtomicBool::new(false)),
        };
        event.ensure();
        event
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Creates the counter on first use and, when seeding is enabled, adds
    /// today's value already known by the API in the background.
    fn ensure(&self) {
        let created = self.inner.buffer.lock().touch_custom_event(&self.key);
        if !created || !self.inner.config.seed_custom_events {
            return;
        }
        let Some(bot_id) = self.inner.bot_id() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, not fetching value of event {}", self.key);
            return;
        };

        let inner = Arc::clone(&self.inner);
        let key = self.key.clone();
        let was_set = Arc::clone(&self.was_set);
        runtime.spawn(async move {
            if inner.config.debug {
                debug!("[analytics] fetching value for event {}", key);
            }
            let endpoint = ApiEndpoint::Event {
                bot_id,
                key: key.clone(),
            };
            let fetched = match inner.client.send::<()>(Method::GET, &endpoint, None).await {
                Ok(response) => response.json::<EventValue>().await,
                Err(e) => {
                    warn!("failed to fetch value of event {}: {}", key, e);
                    return;
                }
            };
            match fetched {
                Ok(value) if !was_set.load(Ordering::SeqCst) => {
                    if let Err(e) = inner
                        .buffer
                        .lock()
                        .increment_custom_event(&key, value.today_value)
                    {
                        warn!("cannot seed event {}: {}", key, e);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("invalid value for event {}: {}", key, e),
            }
        });
    }

    pub fn increment(&self) -> Result<u64> {
        self.increment_by(1)
    }

    pub fn increment_by(&self, delta: u64) -> Result<u64> {
        if self.inner.config.debug {
            debug!("[analytics] incrementing event {} by {}", self.key, delta);
        }
        self.inner.buffer.lock().increment_custom_event(&self.key, delta)
    }

    pub fn decrement(&self) -> Result<u64> {
        self.decrement_by(1)
    }

    /// Fails with [`crate::AnalyticsError::InvalidValue`] if the counter would
    /// drop below zero; the stored value is left untouched in that case.
    pub fn decrement_by(&self, delta: u64) -> Result<u64> {
        if self.inner.config.debug {
            debug!("[analytics] decrementing event {} by {}", self.key, delta);
        }
        self.inner.buffer.lock().decrement_custom_event(&self.key, delta)
    }

    pub fn set(&self, value: u64) {
        if self.inner.config.debug {
            debug!("[analytics] setting event {} to {}", self.key, value);
        }
        self.was_set.store(true, Ordering::SeqCst);
        self.inner.buffer.lock().set_custom_event(&self.key, value);
    }

    pub fn get(&self) -> u64 {
        self.inner.buffer.lock().custom_event(&self.key).unwrap_or(0)
    }
}
