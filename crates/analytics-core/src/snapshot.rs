use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CommandKind, InteractionKind, MemberBuckets, UserTypeCounts};

/// Unique signature of an interaction: name plus kind (and command kind for
/// application commands).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InteractionKey {
    pub name: String,
    pub kind: InteractionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildStats {
    pub name: String,
    pub icon: Option<String>,
    pub member_count: u64,
    pub interaction_count: u64,
}

/// Guild id used for interactions outside any guild.
pub const DM_GUILD_ID: &str = "dm";

/// In-memory aggregate of not-yet-delivered statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub date: NaiveDate,
    pub guilds: u64,
    pub users: u64,
    pub interactions: HashMap<InteractionKey, u64>,
    pub locales: HashMap<String, u64>,
    pub guild_locales: HashMap<String, u64>,
    pub guild_members: MemberBuckets,
    pub guild_stats: HashMap<String, GuildStats>,
    pub added_guilds: u64,
    pub removed_guilds: u64,
    pub user_types: UserTypeCounts,
    pub custom_events: HashMap<String, u64>,
    pub user_install_count: u64,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self::empty(Utc::now().date_naive())
    }
}

impl StatsSnapshot {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            guilds: 0,
            users: 0,
            interactions: HashMap::new(),
            locales: HashMap::new(),
            guild_locales: HashMap::new(),
            guild_members: MemberBuckets::default(),
            guild_stats: HashMap::new(),
            added_guilds: 0,
            removed_guilds: 0,
            user_types: UserTypeCounts::default(),
            custom_events: HashMap::new(),
            user_install_count: 0,
        }
    }

    /// The snapshot that follows a successful delivery of `self`: everything
    /// is zeroed except custom events and the point-in-time totals.
    pub fn next_baseline(&self, date: NaiveDate) -> Self {
        Self {
            guilds: self.guilds,
            users: self.users,
            custom_events: self.custom_events.clone(),
            user_install_count: self.user_install_count,
            ..Self::empty(date)
        }
    }

    /// Folds an undelivered snapshot back into `self`, which holds whatever
    /// was recorded since `failed` was swapped out.
    ///
    /// Counters are summed. Point-in-time fields and the date come from
    /// `failed`, which was refreshed right before the attempt. Custom events
    /// stay as they are in `self`, since they were carried over on swap.
    pub fn restore(&mut self, failed: StatsSnapshot) {
        self.date = failed.date;
        self.guilds = failed.guilds;
        self.users = failed.users;
        self.guild_members = failed.guild_members;
        self.user_install_count = failed.user_install_count;

        for (key, count) in failed.interactions {
            *self.interactions.entry(key).or_insert(0) += count;
        }
        for (locale, count) in failed.locales {
            *self.locales.entry(locale).or_insert(0) += count;
        }
        // Recomputed wholesale on every interaction, so a non-empty live
        // value is always the fresher one.
        if self.guild_locales.is_empty() {
            self.guild_locales = failed.guild_locales;
        }
        for (guild_id, stats) in failed.guild_stats {
            self.guild_stats
                .entry(guild_id)
                .and_modify(|live| live.interaction_count += stats.interaction_count)
                .or_insert(stats);
        }

        self.added_guilds += failed.added_guilds;
        self.removed_guilds += failed.removed_guilds;
        self.user_types.add_assign(failed.user_types);
    }

    pub fn to_payload(&self) -> StatsPayload {
        let mut interactions: Vec<_> = self.interactions.iter().collect();
        interactions.sort_by(|a, b| a.0.cmp(b.0));

        let mut guilds_stats: Vec<_> = self
            .guild_stats
            .iter()
            .map(|(guild_id, stats)| GuildStatsEntry {
                guild_id: guild_id.clone(),
                name: stats.name.clone(),
                icon: stats.icon.clone(),
                members: stats.member_count,
                interactions: stats.interaction_count,
            })
            .collect();
        guilds_stats.sort_by(|a, b| a.guild_id.cmp(&b.guild_id));

        StatsPayload {
            date: self.date,
            guilds: self.guilds,
            users: self.users,
            interactions: interactions
                .into_iter()
                .map(|(key, count)| InteractionEntry {
                    name: key.name.clone(),
                    number: *count,
                    interaction_type: key.kind.type_code(),
                    command_type: key.kind.command_kind(),
                })
                .collect(),
            locales: locale_entries(&self.locales),
            guilds_locales: locale_entries(&self.guild_locales),
            guild_members: self.guild_members,
            guilds_stats,
            added_guilds: self.added_guilds,
            removed_guilds: self.removed_guilds,
            users_type: self.user_types,
            custom_events: self.custom_events.clone(),
            user_install_count: self.user_install_count,
        }
    }
}

fn locale_entries(locales: &HashMap<String, u64>) -> Vec<LocaleEntry> {
    let mut entries: Vec<_> = locales
        .iter()
        .map(|(locale, number)| LocaleEntry {
            locale: locale.clone(),
            number: *number,
        })
        .collect();
    entries.sort_by(|a, b| a.locale.cmp(&b.locale));
    entries
}

/// JSON body of `POST /bots/{id}/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsPayload {
    pub date: NaiveDate,
    pub guilds: u64,
    pub users: u64,
    pub interactions: Vec<InteractionEntry>,
    pub locales: Vec<LocaleEntry>,
    #[serde(rename = "guildsLocales")]
    pub guilds_locales: Vec<LocaleEntry>,
    #[serde(rename = "guildMembers")]
    pub guild_members: MemberBuckets,
    #[serde(rename = "guildsStats")]
    pub guilds_stats: Vec<GuildStatsEntry>,
    #[serde(rename = "addedGuilds")]
    pub added_guilds: u64,
    #[serde(rename = "removedGuilds")]
    pub removed_guilds: u64,
    pub users_type: UserTypeCounts,
    pub custom_events: HashMap<String, u64>,
    pub user_install_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub name: String,
    pub number: u64,
    #[serde(rename = "type")]
    pub interaction_type: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub command_type: Option<CommandKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleEntry {
    pub locale: String,
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildStatsEntry {
    #[serde(rename = "guildId")]
    pub guild_id: String,
    pub name: String,
    pub icon: Option<String>,
    pub members: u64,
    pub interactions: u64,
}
