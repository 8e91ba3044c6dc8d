//! Database models.

pub mod guild_config;
pub mod invite;
pub mod leveling;
pub mod prefix;
pub mod user_profile;

pub use guild_config::{
    AnnounceConfig, AutoroleConfig, CounterChannels, GuildConfig, LevelingConfig,
    StarboardConfig, TicketConfig, TwitchConfig, YoutubeConfig, default_automod,
};
pub use invite::{InviteCounts, InviteKind, InviteRecord, InviteSnapshot, merge_inviter};
pub use leveling::{LevelingEntry, LevelingKey};
pub use prefix::PrefixEntry;
pub use user_profile::{INTERACTIONS, Interactions, UserProfile};
