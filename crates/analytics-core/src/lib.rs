pub mod analytics;
pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod snapshot;
pub mod source;
pub mod types;

pub use analytics::{Analytics, LifecycleState, LIBRARY_VERSION};
pub use buffer::{classify, upsert, PointInTime, StatsBuffer};
pub use config::{AnalyticsConfig, RetryConfig, DEFAULT_API_BASE};
pub use error::{AnalyticsError, Result};
pub use events::CustomEvent;
pub use http::{ApiEndpoint, RetryingHttpClient};
pub use snapshot::{
    GuildStats, GuildStatsEntry, InteractionEntry, InteractionKey, LocaleEntry, StatsPayload,
    StatsSnapshot, DM_GUILD_ID,
};
pub use source::{BotSource, GuildExtractor, LocalShard, ShardAggregator};
pub use types::{
    BotIdentity, CommandKind, GuildContext, GuildSummary, InteractionDescriptor, InteractionKind,
    MemberBuckets, MemberContext, Permissions, UserType, UserTypeCounts,
};
