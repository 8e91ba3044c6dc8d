//! Per-user profile model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mongodb::bson::{Bson, Document, doc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::database::lenient;
use crate::database::record::{Record, RecordDefaults, UserId, int_field};
use crate::database::store::Collection;
use crate::error::Result;

/// Named interaction counters every profile carries.
///
/// Adding a name here backfills it with zero on the next read of each profile.
pub const INTERACTIONS: [&str; 14] = [
    "bites",
    "cuddles",
    "winks",
    "hugs",
    "kisses",
    "pats",
    "slaps",
    "tickles",
    "licks",
    "feeds",
    "facepalms",
    "blushes",
    "tail_wags",
    "cries",
];

/// Interaction counters stored as top-level integer fields.
///
/// Numbers of any width are read as integers; non-numeric leftovers from
/// older schemas are dropped on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Interactions(BTreeMap<String, i64>);

impl Interactions {
    fn catalog() -> Self {
        Self(INTERACTIONS.iter().map(|name| (name.to_string(), 0)).collect())
    }
}

impl<'de> Deserialize<'de> for Interactions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, Bson>::deserialize(deserializer)?;
        let counters = raw
            .into_iter()
            .filter_map(|(name, value)| lenient::counter(&value).map(|n| (name, n)))
            .collect();
        Ok(Self(counters))
    }
}

/// User profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub user_id: UserId,

    pub description: String,
    pub badges: Vec<String>,
    #[serde(deserialize_with = "lenient::int")]
    pub cmds_used: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub bugs_reported: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub suggestions_submitted: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub rating: i64,
    pub rank_card_template: String,

    #[serde(deserialize_with = "lenient::int")]
    pub times_thanked: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub times_simped: i64,
    /// Whether the user's deleted messages may be sniped.
    pub snipe: bool,

    // Global chat identity
    pub gc_nick: Option<String>,
    pub gc_avatar: Option<String>,
    pub gc_rules_accepted: bool,

    /// Partner id, always null together with `married_at`.
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub married_to: Option<UserId>,
    /// Unix seconds the pairing was made.
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub married_at: Option<i64>,

    #[serde(flatten)]
    pub interactions: Interactions,
}

impl UserProfile {
    /// Value of a named interaction counter, zero if never recorded.
    pub fn interaction(&self, name: &str) -> i64 {
        self.interactions.0.get(name).copied().unwrap_or(0)
    }

    /// Increment a named interaction counter and return the new value.
    pub fn bump_interaction(&mut self, name: &str) -> i64 {
        let counter = self.interactions.0.entry(name.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Current partner and the time of pairing.
    pub fn partner(&self) -> Option<(UserId, i64)> {
        self.married_to.zip(self.married_at)
    }

    pub fn pair_with(&mut self, partner: UserId, at: DateTime<Utc>) {
        self.married_to = Some(partner);
        self.married_at = Some(at.timestamp());
    }

    pub fn unpair(&mut self) {
        self.married_to = None;
        self.married_at = None;
    }
}

impl Record for UserProfile {
    type Key = UserId;

    const COLLECTION: Collection = Collection::UserProfile;

    fn key(&self) -> UserId {
        self.user_id
    }

    fn key_of(doc: &Document) -> Result<UserId> {
        int_field(doc, Self::COLLECTION, "_id")
    }

    fn filter(key: &UserId) -> Document {
        doc! { "_id": *key }
    }

    fn with_defaults(key: &UserId, _defaults: &RecordDefaults) -> Self {
        Self {
            user_id: *key,
            description: "A very cool EpicBot user!".to_string(),
            badges: vec!["normie".to_string()],
            cmds_used: 0,
            bugs_reported: 0,
            suggestions_submitted: 0,
            rating: 0,
            rank_card_template: "default".to_string(),
            times_thanked: 0,
            times_simped: 0,
            snipe: true,
            gc_nick: None,
            gc_avatar: None,
            gc_rules_accepted: false,
            married_to: None,
            married_at: None,
            interactions: Interactions::catalog(),
        }
    }

    /// A half-set pairing is cleared entirely.
    fn repair(doc: &mut Document) -> bool {
        let to_null = matches!(doc.get("married_to"), None | Some(Bson::Null));
        let at_null = matches!(doc.get("married_at"), None | Some(Bson::Null));
        if to_null == at_null {
            return false;
        }
        doc.insert("married_to", Bson::Null);
        doc.insert("married_at", Bson::Null);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::record::ensure;

    #[test]
    fn test_half_pairing_is_cleared() {
        let raw = doc! { "_id": 1_i64, "married_to": 2_i64 };
        let ensured = ensure::<UserProfile>(Some(raw), &1, &RecordDefaults::default()).unwrap();

        assert!(ensured.modified);
        assert_eq!(ensured.record.partner(), None);
        assert_eq!(ensured.record.married_to, None);
    }

    #[test]
    fn test_pairing_round_trip() {
        let mut profile = UserProfile::with_defaults(&1, &RecordDefaults::default());
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        profile.pair_with(2, at);
        assert_eq!(profile.partner(), Some((2, 1_700_000_000)));

        profile.unpair();
        assert_eq!(profile.partner(), None);
    }

    #[test]
    fn test_interactions_flush_as_top_level_fields() {
        let mut profile = UserProfile::with_defaults(&1, &RecordDefaults::default());
        assert_eq!(profile.bump_interaction("hugs"), 1);
        assert_eq!(profile.bump_interaction("boops"), 1);

        let set = profile.set_fields().unwrap();
        assert_eq!(set.get_i64("hugs").unwrap(), 1);
        assert_eq!(set.get_i64("boops").unwrap(), 1);
        assert_eq!(set.get_i64("cries").unwrap(), 0);
        assert!(!set.contains_key("interactions"));
    }

    #[test]
    fn test_default_description() {
        let profile = UserProfile::with_defaults(&1, &RecordDefaults::default());
        assert_eq!(profile.description, "A very cool EpicBot user!");
    }

    #[test]
    fn test_float_counters_are_read_as_integers() {
        let raw = doc! { "_id": 1_i64, "hugs": 3.0, "cmds_used": 12.0 };
        let profile = ensure::<UserProfile>(Some(raw), &1, &RecordDefaults::default())
            .unwrap()
            .record;
        assert_eq!(profile.interaction("hugs"), 3);
        assert_eq!(profile.cmds_used, 12);
    }

    #[test]
    fn test_non_integer_leftovers_are_dropped() {
        let raw = doc! { "_id": 1_i64, "legacy_note": "hello" };
        let profile = ensure::<UserProfile>(Some(raw), &1, &RecordDefaults::default())
            .unwrap()
            .record;
        assert_eq!(profile.interaction("legacy_note"), 0);
        assert!(!profile.set_fields().unwrap().contains_key("legacy_note"));
    }
}
