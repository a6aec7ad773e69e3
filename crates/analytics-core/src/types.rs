use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an application command, as reported by Discord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CommandKind {
    ChatInput,
    User,
    Message,
}

impl From<CommandKind> for u8 {
    fn from(value: CommandKind) -> Self {
        match value {
            CommandKind::ChatInput => 1,
            CommandKind::User => 2,
            CommandKind::Message => 3,
        }
    }
}

impl TryFrom<u8> for CommandKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::ChatInput),
            2 => Ok(Self::User),
            3 => Ok(Self::Message),
            other => Err(format!("unknown command type {other}")),
        }
    }
}

/// Kind of interaction. Application commands carry their command kind so that
/// `/ping` and a `ping` context-menu entry are counted separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InteractionKind {
    ApplicationCommand(CommandKind),
    MessageComponent,
    Autocomplete,
    ModalSubmit,
}

impl InteractionKind {
    /// Discord interaction type code sent on the wire.
    pub fn type_code(self) -> u8 {
        match self {
            Self::ApplicationCommand(_) => 2,
            Self::MessageComponent => 3,
            Self::Autocomplete => 4,
            Self::ModalSubmit => 5,
        }
    }

    pub fn command_kind(self) -> Option<CommandKind> {
        match self {
            Self::ApplicationCommand(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApplicationCommand(_) => "application_command",
            Self::MessageComponent => "message_component",
            Self::Autocomplete => "autocomplete",
            Self::ModalSubmit => "modal_submit",
        }
    }
}

/// Discord permission bit set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const KICK_MEMBERS: Self = Self(1 << 1);
    pub const BAN_MEMBERS: Self = Self(1 << 2);
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    pub const MANAGE_GUILD: Self = Self(1 << 5);
    pub const MANAGE_NICKNAMES: Self = Self(1 << 27);
    pub const MANAGE_ROLES: Self = Self(1 << 28);
    pub const MANAGE_WEBHOOKS: Self = Self(1 << 29);
    pub const MANAGE_EVENTS: Self = Self(1 << 33);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if at least one bit of `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// Guild the interaction happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildContext {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub member_count: u64,
    pub preferred_locale: Option<String>,
}

/// Member metadata of the user who triggered the interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberContext {
    pub permissions: Permissions,
    pub joined_at: Option<DateTime<Utc>>,
}

/// Framework-neutral view of one interaction, produced by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionDescriptor {
    pub kind: InteractionKind,
    /// Command name for application commands, custom id otherwise.
    pub name: String,
    pub locale: String,
    /// `None` for direct messages.
    pub guild: Option<GuildContext>,
    pub member: Option<MemberContext>,
}

impl InteractionDescriptor {
    pub fn new(kind: InteractionKind, name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            locale: locale.into(),
            guild: None,
            member: None,
        }
    }

    pub fn in_guild(mut self, guild: GuildContext, member: MemberContext) -> Self {
        self.guild = Some(guild);
        self.member = Some(member);
        self
    }

    pub fn is_in_guild(&self) -> bool {
        self.guild.is_some()
    }
}

/// One guild known to the bot, as enumerated by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSummary {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub member_count: u64,
    pub preferred_locale: Option<String>,
}

impl From<&GuildSummary> for GuildContext {
    fn from(value: &GuildSummary) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            icon: value.icon.clone(),
            member_count: value.member_count,
            preferred_locale: value.preferred_locale.clone(),
        }
    }
}

/// Bot identity sent once during initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
    /// Name of the bot-client library, e.g. `serenity` or `twilight`.
    pub framework: String,
    /// Ids of the users owning the application (team members or the owner).
    pub team: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserType {
    Admin,
    Moderator,
    NewMember,
    Other,
    PrivateMessage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTypeCounts {
    pub admin: u64,
    pub moderator: u64,
    pub new_member: u64,
    pub other: u64,
    pub private_message: u64,
}

impl UserTypeCounts {
    pub fn bump(&mut self, user_type: UserType) {
        let slot = match user_type {
            UserType::Admin => &mut self.admin,
            UserType::Moderator => &mut self.moderator,
            UserType::NewMember => &mut self.new_member,
            UserType::Other => &mut self.other,
            UserType::PrivateMessage => &mut self.private_message,
        };
        *slot += 1;
    }

    pub fn add_assign(&mut self, other: UserTypeCounts) {
        self.admin += other.admin;
        self.moderator += other.moderator;
        self.new_member += other.new_member;
        self.other += other.other;
        self.private_message += other.private_message;
    }
}

/// Distribution of guilds by member count. Upper bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBuckets {
    #[serde(rename = "little")]
    pub tiny: u64,
    pub medium: u64,
    #[serde(rename = "big")]
    pub large: u64,
    pub huge: u64,
}

impl MemberBuckets {
    pub fn from_member_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let mut buckets = Self::default();
        for count in counts {
            match count {
                0..=100 => buckets.tiny += 1,
                101..=500 => buckets.medium += 1,
                501..=1500 => buckets.large += 1,
                _ => buckets.huge += 1,
            }
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_buckets_match_reference_distribution() {
        let buckets = MemberBuckets::from_member_counts([50, 200, 1000, 3000, 150]);
        assert_eq!(
            buckets,
            MemberBuckets {
                tiny: 1,
                medium: 2,
                large: 1,
                huge: 1
            }
        );
    }

    #[test]
    fn member_bucket_bounds_are_inclusive() {
        let buckets = MemberBuckets::from_member_counts([100, 101, 500, 501, 1500, 1501]);
        assert_eq!(buckets.tiny, 1);
        assert_eq!(buckets.medium, 2);
        assert_eq!(buckets.large, 2);
        assert_eq!(buckets.huge, 1);
    }

    #[test]
    fn permissions_intersects_any_bit() {
        let moderator = Permissions::KICK_MEMBERS | Permissions::MANAGE_ROLES;
        assert!(Permissions::MANAGE_ROLES.intersects(moderator));
        assert!(!Permissions::ADMINISTRATOR.intersects(moderator));
        assert!(moderator.contains(Permissions::KICK_MEMBERS));
    }

    #[test]
    fn interaction_kind_wire_codes() {
        assert_eq!(
            InteractionKind::ApplicationCommand(CommandKind::User).type_code(),
            2
        );
        assert_eq!(InteractionKind::ModalSubmit.type_code(), 5);
        assert_eq!(InteractionKind::MessageComponent.command_kind(), None);
        assert_eq!(u8::from(CommandKind::Message), 3);
    }
}
