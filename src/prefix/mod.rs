//! Prefix resolution.
//!
//! Resolves which command prefixes apply to a message. Mentioning the bot
//! always works as a prefix, in front of whatever the guild stored.

use std::sync::Arc;

use crate::cache::{CacheStore, Family};
use crate::database::models::PrefixEntry;
use crate::database::{GuildId, UserId};

/// The two ways a user can mention the bot, each followed by a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionForms([String; 2]);

impl MentionForms {
    pub fn for_bot(bot_id: UserId) -> Self {
        Self([format!("<@{bot_id}> "), format!("<@!{bot_id}> ")])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Outcome of matching a message against the effective prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixMatch {
    /// The prefix text as it appears in the message.
    Matched(String),
    /// Nothing matched; these are the guild's stored prefixes.
    Unmatched(Vec<String>),
}

/// Resolves prefixes from the prefix family of the cache.
#[derive(Debug, Clone)]
pub struct PrefixResolver {
    prefixes: Arc<Family<PrefixEntry>>,
    default_prefix: String,
}

impl PrefixResolver {
    pub fn new(cache: &CacheStore) -> Self {
        Self {
            prefixes: Arc::clone(cache.prefixes()),
            default_prefix: cache.defaults().prefix.clone(),
        }
    }

    /// Stored prefixes of a guild, or the global default in direct messages.
    ///
    /// A guild without an entry gets one holding the default prefix.
    pub fn resolve_prefixes(&self, guild_id: Option<GuildId>) -> Vec<String> {
        match guild_id {
            None => vec![self.default_prefix.clone()],
            Some(id) => self.prefixes.get_or_default(id).prefix.clone(),
        }
    }

    /// Match `content` against the mention forms followed by the stored
    /// prefixes, ignoring case.
    ///
    /// The longest matching candidate wins; between equally long ones the
    /// earlier candidate does.
    pub fn resolve_effective_prefixes(
        &self,
        guild_id: Option<GuildId>,
        mentions: &MentionForms,
        content: &str,
    ) -> PrefixMatch {
        let stored = self.resolve_prefixes(guild_id);

        let mut best: Option<&str> = None;
        for candidate in mentions.as_slice().iter().chain(stored.iter()) {
            let Some(matched) = strip_prefix_ignore_case(content, candidate) else {
                continue;
            };
            if best.is_none_or(|b| matched.len() > b.len()) {
                best = Some(matched);
            }
        }

        match best {
            Some(matched) => PrefixMatch::Matched(matched.to_string()),
            None => PrefixMatch::Unmatched(stored),
        }
    }
}

/// The leading slice of `content` equal to `prefix` ignoring case.
fn strip_prefix_ignore_case<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }

    let mut content_chars = content.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = content_chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }

    let end = content_chars.next().map_or(content.len(), |(idx, _)| idx);
    Some(&content[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::RecordDefaults;

    fn resolver_with(guild: GuildId, prefixes: &[&str]) -> (CacheStore, PrefixResolver) {
        let cache = CacheStore::new(RecordDefaults::default());
        cache.prefixes().get_or_default(guild).prefix = prefixes.iter().map(|p| p.to_string()).collect();
        let resolver = PrefixResolver::new(&cache);
        (cache, resolver)
    }

    #[test]
    fn test_direct_message_uses_default() {
        let cache = CacheStore::new(RecordDefaults::default());
        let resolver = PrefixResolver::new(&cache);

        assert_eq!(resolver.resolve_prefixes(None), vec!["e!".to_string()]);
        assert!(cache.prefixes().is_empty());
    }

    #[test]
    fn test_unknown_guild_gets_default_entry() {
        let cache = CacheStore::new(RecordDefaults::default());
        let resolver = PrefixResolver::new(&cache);

        assert_eq!(resolver.resolve_prefixes(Some(9)), vec!["e!".to_string()]);
        assert_eq!(cache.prefixes().len(), 1);
    }

    #[test]
    fn test_legacy_scalar_normalized() {
        let cache = CacheStore::new(RecordDefaults::default());
        let (records, _) = cache
            .prefixes()
            .prepare(vec![mongodb::bson::doc! { "_id": 3_i64, "prefix": "e!" }]);
        cache.prefixes().populate(records);
        let resolver = PrefixResolver::new(&cache);

        assert_eq!(resolver.resolve_prefixes(Some(3)), vec!["e!".to_string()]);
        assert_eq!(cache.prefixes().get(&3).unwrap().prefix, vec!["e!".to_string()]);
    }

    #[test]
    fn test_match_is_case_insensitive_and_keeps_input_text() {
        let (_cache, resolver) = resolver_with(1, &["e!"]);
        let mentions = MentionForms::for_bot(42);

        assert_eq!(
            resolver.resolve_effective_prefixes(Some(1), &mentions, "E!help"),
            PrefixMatch::Matched("E!".to_string())
        );
    }

    #[test]
    fn test_longest_candidate_wins() {
        let (_cache, resolver) = resolver_with(1, &["!", "!!"]);
        let mentions = MentionForms::for_bot(42);

        assert_eq!(
            resolver.resolve_effective_prefixes(Some(1), &mentions, "!!ping"),
            PrefixMatch::Matched("!!".to_string())
        );
        assert_eq!(
            resolver.resolve_effective_prefixes(Some(1), &mentions, "!ping"),
            PrefixMatch::Matched("!".to_string())
        );
    }

    #[test]
    fn test_mentions_always_apply() {
        let (_cache, resolver) = resolver_with(1, &["?"]);
        let mentions = MentionForms::for_bot(42);

        assert_eq!(
            resolver.resolve_effective_prefixes(Some(1), &mentions, "<@!42> help"),
            PrefixMatch::Matched("<@!42> ".to_string())
        );
        assert_eq!(
            resolver.resolve_effective_prefixes(None, &mentions, "<@42> help"),
            PrefixMatch::Matched("<@42> ".to_string())
        );
    }

    #[test]
    fn test_no_match_returns_stored_list() {
        let (_cache, resolver) = resolver_with(1, &["?", "t."]);
        let mentions = MentionForms::for_bot(42);

        assert_eq!(
            resolver.resolve_effective_prefixes(Some(1), &mentions, "hello"),
            PrefixMatch::Unmatched(vec!["?".to_string(), "t.".to_string()])
        );
    }

    #[test]
    fn test_strip_prefix_ignore_case() {
        assert_eq!(strip_prefix_ignore_case("ÄBc", "äb"), Some("ÄB"));
        assert_eq!(strip_prefix_ignore_case("ab", "abc"), None);
        assert_eq!(strip_prefix_ignore_case("ab", ""), None);
        assert_eq!(strip_prefix_ignore_case("ab", "ab"), Some("ab"));
    }
}
