//! Shared fixtures for analytics integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use analytics_core::{
    Analytics, AnalyticsConfig, BotIdentity, BotSource, CommandKind, GuildContext, GuildSummary,
    InteractionDescriptor, InteractionKind, MemberContext, Permissions, RetryConfig,
};
use parking_lot::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const BOT_ID: &str = "1010";
pub const API_KEY: &str = "test-key";

/// Bot source with a mutable guild list.
pub struct FakeBot {
    guilds: Mutex<Vec<GuildSummary>>,
}

impl FakeBot {
    pub fn new(member_counts: &[u64]) -> Arc<Self> {
        let guilds = member_counts
            .iter()
            .enumerate()
            .map(|(i, members)| GuildSummary {
                id: format!("g{i}"),
                name: format!("Guild {i}"),
                icon: None,
                member_count: *members,
                preferred_locale: Some(if i % 2 == 0 { "en-US" } else { "fr" }.to_string()),
            })
            .collect();
        Arc::new(Self {
            guilds: Mutex::new(guilds),
        })
    }

    pub fn guild(&self, index: usize) -> GuildSummary {
        self.guilds.lock()[index].clone()
    }
}

#[async_trait::async_trait]
impl BotSource for FakeBot {
    fn identity(&self) -> BotIdentity {
        BotIdentity {
            id: BOT_ID.to_string(),
            username: "test-bot".to_string(),
            avatar: Some("abc123".to_string()),
            framework: "test-framework".to_string(),
            team: vec!["42".to_string(), "43".to_string()],
        }
    }

    fn guilds(&self) -> Vec<GuildSummary> {
        self.guilds.lock().clone()
    }

    async fn user_install_count(&self) -> u64 {
        7
    }
}

/// Config pointing at the mock server, with fast retries and no automatic
/// flush during the test.
pub fn test_config(server: &MockServer) -> AnalyticsConfig {
    AnalyticsConfig::new(API_KEY)
        .with_api_base(server.uri())
        .with_debug(true)
        .with_flush_interval(Duration::from_secs(3600))
        .with_retry(RetryConfig {
            max_retries: 2,
            backoff_base_ms: 1,
        })
}

pub async fn mount_registration(server: &MockServer) {
    Mock::given(method("PATCH"))
        .and(path(format!("/bots/{BOT_ID}")))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Analytics instance that already went through initialization.
pub async fn ready_analytics(server: &MockServer, bot: Arc<FakeBot>) -> Analytics {
    ready_analytics_with(test_config(server), server, bot).await
}

pub async fn ready_analytics_with(
    config: AnalyticsConfig,
    server: &MockServer,
    bot: Arc<FakeBot>,
) -> Analytics {
    mount_registration(server).await;
    let analytics = Analytics::new(config, bot).expect("analytics");
    analytics.initialize().await.expect("initialize");
    analytics
}

pub fn slash(name: &str, locale: &str) -> InteractionDescriptor {
    InteractionDescriptor::new(
        InteractionKind::ApplicationCommand(CommandKind::ChatInput),
        name,
        locale,
    )
}

pub fn slash_in(
    name: &str,
    guild: &GuildSummary,
    permissions: Permissions,
) -> InteractionDescriptor {
    slash(name, "en-US").in_guild(
        GuildContext::from(guild),
        MemberContext {
            permissions,
            joined_at: None,
        },
    )
}

/// Bodies of the stats deliveries received so far.
pub async fn stats_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| req.method.to_string() == "POST" && req.url.path().ends_with("/stats"))
        .map(|req: &Request| req.body_json().expect("json body"))
        .collect()
}
