use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::{AnalyticsError, Result};
use crate::snapshot::{GuildStats, InteractionKey, StatsSnapshot, DM_GUILD_ID};
use crate::types::{GuildSummary, InteractionDescriptor, MemberBuckets, Permissions, UserType};

const ADMIN_PERMISSIONS: Permissions = Permissions::ADMINISTRATOR.union(Permissions::MANAGE_GUILD);

const MODERATOR_PERMISSIONS: Permissions = Permissions::MANAGE_CHANNELS
    .union(Permissions::KICK_MEMBERS)
    .union(Permissions::BAN_MEMBERS)
    .union(Permissions::MANAGE_NICKNAMES)
    .union(Permissions::MANAGE_ROLES)
    .union(Permissions::MANAGE_WEBHOOKS)
    .union(Permissions::MANAGE_EVENTS);

const NEW_MEMBER_WINDOW_DAYS: i64 = 7;

/// Finds the entry for `key` and updates it, or inserts the value built by
/// `insert`. Every keyed collection of the snapshot goes through here.
pub fn upsert<K, V, I, U>(map: &mut HashMap<K, V>, key: K, insert: I, update: U)
where
    K: Eq + Hash,
    I: FnOnce() -> V,
    U: FnOnce(&mut V),
{
    map.entry(key).and_modify(update).or_insert_with(insert);
}

/// Point-in-time values refreshed before every flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointInTime {
    pub guilds: u64,
    pub users: u64,
    pub guild_members: MemberBuckets,
    pub user_install_count: u64,
}

/// Mutable aggregate that every tracked event is folded into.
#[derive(Debug, Clone, Default)]
pub struct StatsBuffer {
    snapshot: StatsSnapshot,
}

impl StatsBuffer {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            snapshot: StatsSnapshot::empty(date),
        }
    }

    pub fn snapshot(&self) -> &StatsSnapshot {
        &self.snapshot
    }

    /// Records one interaction under `name`.
    ///
    /// `known_guilds` is the full guild list of the bot, used to recompute
    /// the guild locale distribution. `now` drives the new-member check.
    pub fn record_interaction(
        &mut self,
        descriptor: &InteractionDescriptor,
        name: String,
        known_guilds: &[GuildSummary],
        now: DateTime<Utc>,
    ) -> Option<UserType> {
        let snapshot = &mut self.snapshot;

        upsert(
            &mut snapshot.locales,
            descriptor.locale.clone(),
            || 1,
            |count| *count += 1,
        );

        snapshot.guild_locales = guild_locales(known_guilds);

        upsert(
            &mut snapshot.interactions,
            InteractionKey {
                name,
                kind: descriptor.kind,
            },
            || 1,
            |count| *count += 1,
        );

        let guild_id = descriptor
            .guild
            .as_ref()
            .map_or_else(|| DM_GUILD_ID.to_string(), |guild| guild.id.clone());
        upsert(
            &mut snapshot.guild_stats,
            guild_id,
            || match &descriptor.guild {
                Some(guild) => GuildStats {
                    name: guild.name.clone(),
                    icon: guild.icon.clone(),
                    member_count: guild.member_count,
                    interaction_count: 1,
                },
                None => GuildStats {
                    name: "DM".to_string(),
                    icon: None,
                    member_count: 0,
                    interaction_count: 1,
                },
            },
            |stats| stats.interaction_count += 1,
        );

        let user_type = classify(descriptor, now);
        if let Some(user_type) = user_type {
            snapshot.user_types.bump(user_type);
        }
        user_type
    }

    pub fn record_guild_join(&mut self) {
        self.snapshot.added_guilds += 1;
    }

    pub fn record_guild_leave(&mut self) {
        self.snapshot.removed_guilds += 1;
    }

    pub fn record_user_type(&mut self, user_type: UserType) {
        self.snapshot.user_types.bump(user_type);
    }

    pub fn custom_event(&self, key: &str) -> Option<u64> {
        self.snapshot.custom_events.get(key).copied()
    }

    /// Creates the event at zero if it was never touched.
    pub fn touch_custom_event(&mut self, key: &str) -> bool {
        if self.snapshot.custom_events.contains_key(key) {
            return false;
        }
        self.snapshot.custom_events.insert(key.to_string(), 0);
        true
    }

    pub fn increment_custom_event(&mut self, key: &str, delta: u64) -> Result<u64> {
        let current = self.custom_event(key).unwrap_or(0);
        let next = current
            .checked_add(delta)
            .ok_or_else(|| AnalyticsError::InvalidEventsCount {
                key: key.to_string(),
            })?;
        self.snapshot.custom_events.insert(key.to_string(), next);
        Ok(next)
    }

    pub fn decrement_custom_event(&mut self, key: &str, delta: u64) -> Result<u64> {
        let current = self.custom_event(key).unwrap_or(0);
        let next = current.checked_sub(delta).ok_or_else(|| {
            AnalyticsError::InvalidValue(format!(
                "cannot decrement event '{key}' by {delta}: current value is {current}"
            ))
        })?;
        self.snapshot.custom_events.insert(key.to_string(), next);
        Ok(next)
    }

    pub fn set_custom_event(&mut self, key: &str, value: u64) {
        self.snapshot.custom_events.insert(key.to_string(), value);
    }

    pub fn refresh(&mut self, values: PointInTime) {
        self.snapshot.guilds = values.guilds;
        self.snapshot.users = values.users;
        self.snapshot.guild_members = values.guild_members;
        self.snapshot.user_install_count = values.user_install_count;
    }

    /// Swaps the current snapshot out for delivery, leaving the post-delivery
    /// baseline in its place.
    pub fn take_for_flush(&mut self, today: NaiveDate) -> StatsSnapshot {
        let baseline = self.snapshot.next_baseline(today);
        std::mem::replace(&mut self.snapshot, baseline)
    }

    /// Puts a snapshot whose delivery failed back into the buffer.
    pub fn restore(&mut self, failed: StatsSnapshot) {
        self.snapshot.restore(failed);
    }
}

fn guild_locales(guilds: &[GuildSummary]) -> HashMap<String, u64> {
    let mut locales = HashMap::new();
    for locale in guilds.iter().filter_map(|g| g.preferred_locale.as_ref()) {
        upsert(&mut locales, locale.clone(), || 1, |count| *count += 1);
    }
    locales
}

/// Classifies the actor of an interaction. First match wins; `None` when no
/// bucket applies.
pub fn classify(descriptor: &InteractionDescriptor, now: DateTime<Utc>) -> Option<UserType> {
    if !descriptor.is_in_guild() {
        return Some(UserType::PrivateMessage);
    }
    let member = descriptor.member.as_ref()?;

    if member.permissions.intersects(ADMIN_PERMISSIONS) {
        return Some(UserType::Admin);
    }
    if member.permissions.intersects(MODERATOR_PERMISSIONS) {
        return Some(UserType::Moderator);
    }
    match member.joined_at {
        Some(joined_at) if joined_at > now - Duration::days(NEW_MEMBER_WINDOW_DAYS) => {
            Some(UserType::NewMember)
        }
        _ => None,
    }
}
