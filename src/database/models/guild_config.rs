//! Per-guild configuration model.

use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::database::lenient;
use crate::database::record::{GuildId, Record, RecordDefaults, int_field};
use crate::database::store::Collection;
use crate::error::Result;

/// Moderation filters present in the built-in automod default.
const AUTOMOD_FILTERS: [&str; 9] = [
    "banned_words",
    "all_caps",
    "duplicate_text",
    "message_spam",
    "invites",
    "links",
    "mass_mentions",
    "emoji_spam",
    "zalgo_text",
];

/// Built-in default for the moderation sub-document.
///
/// Every filter starts disabled with empty allow-lists.
pub fn default_automod() -> Document {
    let mut automod = Document::new();
    for filter in AUTOMOD_FILTERS {
        automod.insert(
            filter,
            doc! {
                "enabled": false,
                "punishments": ["delete"],
                "whitelist_channels": [],
                "whitelist_roles": [],
            },
        );
    }
    automod.insert("log_channel", mongodb::bson::Bson::Null);
    automod
}

/// Join or leave announcement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    pub channel_id: Option<i64>,
    pub message: Option<String>,
    pub embed: bool,
    /// Keys this version does not know, written back unchanged.
    #[serde(flatten)]
    pub extra: Document,
}

/// Roles granted automatically on join.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoroleConfig {
    pub humans: Vec<i64>,
    pub bots: Vec<i64>,
    pub all: Vec<i64>,
    #[serde(flatten)]
    pub extra: Document,
}

/// Leveling settings for the guild (not the per-user progress).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelingConfig {
    pub enabled: bool,
    pub channel_id: Option<i64>,
    pub message: Option<String>,
    /// Level -> role reward. Stored under `" roles"`.
    #[serde(rename = " roles")]
    pub roles: Document,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    pub channel_id: Option<i64>,
    pub youtube_id: Option<String>,
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchConfig {
    pub channel_id: Option<i64>,
    pub username: Option<String>,
    pub message: Option<String>,
    pub currently_live: bool,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarboardConfig {
    pub enabled: bool,
    #[serde(deserialize_with = "lenient::int")]
    pub star_count: i64,
    pub channel_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Document,
}

impl Default for StarboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            star_count: 3,
            channel_id: None,
            extra: Document::new(),
        }
    }
}

/// Ticket panel settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketConfig {
    pub message_id: Option<i64>,
    pub channel: Option<i64>,
    pub roles: Vec<i64>,
    #[serde(flatten)]
    pub extra: Document,
}

/// Channels whose names display cached counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterChannels {
    pub members: Option<i64>,
    /// Stored under `huamns`.
    #[serde(rename = "huamns")]
    pub humans: Option<i64>,
    pub bots: Option<i64>,
    pub channels: Option<i64>,
    pub categories: Option<i64>,
    pub roles: Option<i64>,
    pub emojis: Option<i64>,
    #[serde(flatten)]
    pub extra: Document,
}

/// Complete guild configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildConfig {
    #[serde(rename = "_id")]
    pub guild_id: GuildId,

    pub disabled_cmds: Vec<String>,
    pub disabled_channels: Vec<i64>,
    pub disabled_categories: Vec<i64>,

    /// Custom commands, shaped by the command layer.
    pub custom_cmds: Vec<Document>,

    pub welcome: AnnounceConfig,
    pub leave: AnnounceConfig,
    pub autorole: AutoroleConfig,

    /// Nitro-less emoji replacement.
    pub nqn: bool,

    pub leveling: LevelingConfig,
    pub autoposting: Vec<Document>,
    pub youtube: YoutubeConfig,
    pub twitch: TwitchConfig,
    pub starboard: StarboardConfig,

    pub logging: Option<i64>,
    pub chatbot: Option<i64>,

    /// Moderation settings. Shape is owned by the moderation layer.
    pub automod: Document,

    pub ghost_ping: bool,
    pub bump_reminders: bool,
    pub antialts: bool,
    pub globalchat: bool,
    pub counting: Option<i64>,
    pub antihoisting: bool,

    pub tickets: TicketConfig,
    pub counters: CounterChannels,
}

impl GuildConfig {
    /// Whether `command` is disabled in this guild.
    pub fn is_disabled(&self, command: &str) -> bool {
        self.disabled_cmds.iter().any(|c| c.eq_ignore_ascii_case(command))
    }
}

impl Record for GuildConfig {
    type Key = GuildId;

    const COLLECTION: Collection = Collection::ServerConfig;

    fn key(&self) -> GuildId {
        self.guild_id
    }

    fn key_of(doc: &Document) -> Result<GuildId> {
        int_field(doc, Self::COLLECTION, "_id")
    }

    fn filter(key: &GuildId) -> Document {
        doc! { "_id": *key }
    }

    fn with_defaults(key: &GuildId, defaults: &RecordDefaults) -> Self {
        Self {
            guild_id: *key,
            disabled_cmds: Vec::new(),
            disabled_channels: Vec::new(),
            disabled_categories: Vec::new(),
            custom_cmds: Vec::new(),
            welcome: AnnounceConfig::default(),
            leave: AnnounceConfig::default(),
            autorole: AutoroleConfig::default(),
            nqn: false,
            leveling: LevelingConfig::default(),
            autoposting: Vec::new(),
            youtube: YoutubeConfig::default(),
            twitch: TwitchConfig::default(),
            starboard: StarboardConfig::default(),
            logging: None,
            chatbot: None,
            automod: defaults.automod.clone(),
            ghost_ping: false,
            bump_reminders: false,
            antialts: false,
            globalchat: false,
            counting: None,
            antihoisting: false,
            tickets: TicketConfig::default(),
            counters: CounterChannels::default(),
        }
    }
}
