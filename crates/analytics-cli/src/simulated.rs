//! In-process bot that produces random traffic.

use std::sync::Arc;

use analytics_core::{
    BotIdentity, BotSource, CommandKind, GuildContext, GuildSummary, InteractionDescriptor,
    InteractionKind, MemberContext, Permissions,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;

const COMMANDS: &[&str] = &["ping", "help", "ban", "play", "stats"];
const COMPONENTS: &[&str] = &["confirm", "cancel", "next_page"];
const LOCALES: &[&str] = &["en-US", "en-GB", "fr", "de", "es-ES", "ja"];

/// One thing that happened on the simulated bot.
#[derive(Debug)]
pub enum SimEvent {
    Interaction(InteractionDescriptor),
    GuildJoin,
    GuildLeave,
    Vote,
}

pub struct SimulatedBot {
    guilds: Mutex<Vec<GuildSummary>>,
    next_id: Mutex<u64>,
}

impl SimulatedBot {
    pub fn new(guild_count: usize) -> Arc<Self> {
        let mut rng = rand::thread_rng();
        let guilds = (0..guild_count as u64)
            .map(|id| random_guild(&mut rng, id))
            .collect();
        Arc::new(Self {
            guilds: Mutex::new(guilds),
            next_id: Mutex::new(guild_count as u64),
        })
    }

    /// Picks the next event and applies its effect on the guild list.
    pub fn next_event(&self) -> SimEvent {
        let mut rng = rand::thread_rng();
        match rng.gen_range(0..100) {
            0..=1 => {
                let mut next_id = self.next_id.lock();
                self.guilds.lock().push(random_guild(&mut rng, *next_id));
                *next_id += 1;
                SimEvent::GuildJoin
            }
            2 => {
                let mut guilds = self.guilds.lock();
                if guilds.is_empty() {
                    return SimEvent::Vote;
                }
                let index = rng.gen_range(0..guilds.len());
                guilds.swap_remove(index);
                SimEvent::GuildLeave
            }
            3..=7 => SimEvent::Vote,
            _ => SimEvent::Interaction(self.random_interaction(&mut rng)),
        }
    }

    pub fn random_interaction<R: Rng>(&self, rng: &mut R) -> InteractionDescriptor {
        let kind = match rng.gen_range(0..10) {
            0..=5 => InteractionKind::ApplicationCommand(CommandKind::ChatInput),
            6 => InteractionKind::ApplicationCommand(CommandKind::User),
            7 => InteractionKind::MessageComponent,
            8 => InteractionKind::Autocomplete,
            _ => InteractionKind::ModalSubmit,
        };
        let names = match kind {
            InteractionKind::MessageComponent | InteractionKind::ModalSubmit => COMPONENTS,
            _ => COMMANDS,
        };
        let name = names.choose(rng).copied().unwrap_or("ping");
        let locale = LOCALES.choose(rng).copied().unwrap_or("en-US");
        let descriptor = InteractionDescriptor::new(kind, name, locale);

        // One interaction in five comes from a direct message.
        let guild = {
            let guilds = self.guilds.lock();
            if rng.gen_bool(0.2) {
                None
            } else {
                guilds.choose(rng).map(GuildContext::from)
            }
        };
        let Some(guild) = guild else {
            return descriptor;
        };

        let permissions = match rng.gen_range(0..20) {
            0 => Permissions::ADMINISTRATOR,
            1..=2 => Permissions::BAN_MEMBERS | Permissions::KICK_MEMBERS,
            _ => Permissions::empty(),
        };
        let member = MemberContext {
            permissions,
            joined_at: Some(Utc::now() - Duration::days(rng.gen_range(0..60))),
        };
        descriptor.in_guild(guild, member)
    }
}

fn random_guild<R: Rng>(rng: &mut R, id: u64) -> GuildSummary {
    let member_count = match rng.gen_range(0..10) {
        0..=5 => rng.gen_range(2..=100),
        6..=7 => rng.gen_range(101..=500),
        8 => rng.gen_range(501..=1500),
        _ => rng.gen_range(1501..=50_000),
    };
    GuildSummary {
        id: format!("{}", 900_000 + id),
        name: format!("Simulated guild {id}"),
        icon: None,
        member_count,
        preferred_locale: LOCALES.choose(rng).map(|l| l.to_string()),
    }
}

#[async_trait]
impl BotSource for SimulatedBot {
    fn identity(&self) -> BotIdentity {
        BotIdentity {
            id: "000000000000000001".to_string(),
            username: "analytics-simulator".to_string(),
            avatar: None,
            framework: "analytics-cli".to_string(),
            team: Vec::new(),
        }
    }

    fn guilds(&self) -> Vec<GuildSummary> {
        self.guilds.lock().clone()
    }

    async fn user_install_count(&self) -> u64 {
        42
    }
}
