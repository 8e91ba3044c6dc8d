//! Invite attribution models.

use std::collections::BTreeMap;

use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::database::lenient;
use crate::database::record::{GuildId, UserId};

/// Category of an invite count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviteKind {
    /// Members who joined and stayed.
    Real,
    /// Joins judged fake (alts, self-invites).
    Fake,
    /// Members who joined and later left.
    Left,
}

impl InviteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Fake => "fake",
            Self::Left => "left",
        }
    }
}

/// Invite counts of one inviter in one guild.
///
/// Absent counts read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteCounts {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_int")]
    pub real: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_int")]
    pub fake: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_int")]
    pub left: Option<i64>,
}

impl InviteCounts {
    /// Counts for a user's first record: every kind zero except `kind`.
    pub fn first(kind: InviteKind, amount: i64) -> Self {
        let mut counts = Self {
            real: Some(0),
            fake: Some(0),
            left: Some(0),
        };
        counts.set(kind, amount);
        counts
    }

    pub fn get(&self, kind: InviteKind) -> i64 {
        match kind {
            InviteKind::Real => self.real,
            InviteKind::Fake => self.fake,
            InviteKind::Left => self.left,
        }
        .unwrap_or(0)
    }

    pub fn set(&mut self, kind: InviteKind, amount: i64) {
        let slot = match kind {
            InviteKind::Real => &mut self.real,
            InviteKind::Fake => &mut self.fake,
            InviteKind::Left => &mut self.left,
        };
        *slot = Some(amount);
    }

    /// `[real, fake, left]`.
    pub fn all(&self) -> [i64; 3] {
        [
            self.get(InviteKind::Real),
            self.get(InviteKind::Fake),
            self.get(InviteKind::Left),
        ]
    }

    /// Sum of all kinds, `None` if it does not fit in an `i64`.
    pub fn total(&self) -> Option<i64> {
        self.all().iter().try_fold(0_i64, |sum, n| sum.checked_add(*n))
    }
}

/// Invite ledger document of one user.
///
/// Guild keys are stringified guild ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteRecord {
    #[serde(rename = "_id")]
    pub user_id: UserId,

    /// Counts of invites this user made, per guild.
    #[serde(default)]
    pub guilds: BTreeMap<String, InviteCounts>,

    /// Who invited this user, per guild.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviters: Option<BTreeMap<String, UserId>>,
}

impl InviteRecord {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            guilds: BTreeMap::new(),
            inviters: None,
        }
    }

    pub fn filter(user_id: UserId) -> Document {
        doc! { "_id": user_id }
    }

    pub fn counts(&self, guild_id: GuildId) -> InviteCounts {
        self.guilds
            .get(&guild_id.to_string())
            .cloned()
            .unwrap_or_default()
    }

    pub fn inviter(&self, guild_id: GuildId) -> Option<UserId> {
        self.inviters.as_ref()?.get(&guild_id.to_string()).copied()
    }
}

/// Merge an inviter into an inviter map.
///
/// The new value for the same guild always wins; other guilds are kept.
pub fn merge_inviter(
    existing: Option<BTreeMap<String, UserId>>,
    guild_id: GuildId,
    inviter_id: UserId,
) -> BTreeMap<String, UserId> {
    let mut merged = existing.unwrap_or_default();
    merged.insert(guild_id.to_string(), inviter_id);
    merged
}

/// Last observed invite-code use counts of one guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteSnapshot {
    #[serde(rename = "_id")]
    pub guild_id: GuildId,

    /// Invite code -> uses.
    #[serde(default)]
    pub invites: BTreeMap<String, i64>,
}
