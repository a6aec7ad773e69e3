use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{BotIdentity, GuildSummary, MemberBuckets};

/// What a bot-client adapter has to expose to the analytics core.
#[async_trait]
pub trait BotSource: Send + Sync {
    /// Identity of the logged-in bot. Only called once the bot is connected.
    fn identity(&self) -> BotIdentity;

    /// Guilds visible to this process.
    fn guilds(&self) -> Vec<GuildSummary>;

    /// Installs of the application outside any guild.
    async fn user_install_count(&self) -> u64 {
        0
    }
}

/// Extracts one number from the guilds of a single shard.
pub type GuildExtractor = fn(&[GuildSummary]) -> u64;

/// Runs an extractor on every shard and sums the results.
///
/// Sharded bots implement this on top of their library's broadcast/eval
/// primitive; single-process bots use [`LocalShard`].
#[async_trait]
pub trait ShardAggregator: Send + Sync {
    async fn aggregate(&self, extractor: GuildExtractor) -> u64;
}

/// Aggregator for bots running every guild in the current process.
pub struct LocalShard {
    source: Arc<dyn BotSource>,
}

impl LocalShard {
    pub fn new(source: Arc<dyn BotSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ShardAggregator for LocalShard {
    async fn aggregate(&self, extractor: GuildExtractor) -> u64 {
        extractor(&self.source.guilds())
    }
}

pub fn guild_count(guilds: &[GuildSummary]) -> u64 {
    guilds.len() as u64
}

pub fn member_count(guilds: &[GuildSummary]) -> u64 {
    guilds.iter().map(|g| g.member_count).sum()
}

pub fn tiny_guilds(guilds: &[GuildSummary]) -> u64 {
    buckets(guilds).tiny
}

pub fn medium_guilds(guilds: &[GuildSummary]) -> u64 {
    buckets(guilds).medium
}

pub fn large_guilds(guilds: &[GuildSummary]) -> u64 {
    buckets(guilds).large
}

pub fn huge_guilds(guilds: &[GuildSummary]) -> u64 {
    buckets(guilds).huge
}

fn buckets(guilds: &[GuildSummary]) -> MemberBuckets {
    MemberBuckets::from_member_counts(guilds.iter().map(|g| g.member_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGuilds(Vec<u64>);

    #[async_trait]
    impl BotSource for FixedGuilds {
        fn identity(&self) -> BotIdentity {
            BotIdentity {
                id: "1".to_string(),
                username: "bot".to_string(),
                avatar: None,
                framework: "test".to_string(),
                team: Vec::new(),
            }
        }

        fn guilds(&self) -> Vec<GuildSummary> {
            self.0
                .iter()
                .enumerate()
                .map(|(i, members)| GuildSummary {
                    id: i.to_string(),
                    name: format!("guild {i}"),
                    icon: None,
                    member_count: *members,
                    preferred_locale: None,
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn local_shard_extractors_agree_with_member_buckets() {
        let counts = vec![50, 200, 1000, 3000, 150, 100, 1500];
        let shard = LocalShard::new(Arc::new(FixedGuilds(counts.clone())));
        let expected = MemberBuckets::from_member_counts(counts);

        assert_eq!(shard.aggregate(guild_count).await, 7);
        assert_eq!(shard.aggregate(member_count).await, 6000);
        assert_eq!(shard.aggregate(tiny_guilds).await, expected.tiny);
        assert_eq!(shard.aggregate(medium_guilds).await, expected.medium);
        assert_eq!(shard.aggregate(large_guilds).await, expected.large);
        assert_eq!(shard.aggregate(huge_guilds).await, expected.huge);
    }
}
