use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::RECIPIENT_DELIMITER;
use crate::error::ParseError;

// Account identity = row id of the `users` table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| ParseError::UserId(s.to_string()))
    }
}

/// Read access policy of a chunk.
///
/// Visibility never changes ownership: only the owner may delete or
/// re-share a chunk, whatever its visibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Owner only.
    #[default]
    Private,
    /// Owner plus the chunk's recipient list.
    Shared,
    /// Every user.
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Shared => "shared",
            Visibility::Public => "public",
        }
    }
}

impl FromStr for Visibility {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Visibility::Private),
            "shared" => Ok(Visibility::Shared),
            "public" => Ok(Visibility::Public),
            other => Err(ParseError::Visibility(other.to_string())),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(ParseError::Role(other.to_string())),
        }
    }
}

/// Which AI tier produced an assistant turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    Local,
    Cloud,
}

impl ProviderTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTier::Local => "local",
            ProviderTier::Cloud => "cloud",
        }
    }
}

impl FromStr for ProviderTier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ProviderTier::Local),
            "cloud" => Ok(ProviderTier::Cloud),
            other => Err(ParseError::ProviderTier(other.to_string())),
        }
    }
}

/// Deployment mode of the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tenancy {
    /// One implicit user; retrieval is not visibility-scoped.
    #[default]
    Single,
    /// Many accounts; an admin account is bootstrapped on first start.
    Multi,
}

impl FromStr for Tenancy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "false" | "0" => Ok(Tenancy::Single),
            "multi" | "true" | "1" => Ok(Tenancy::Multi),
            other => Err(ParseError::Tenancy(other.to_string())),
        }
    }
}

/// Recipients of a shared chunk.
///
/// Stored as a single delimited column but always compared as a set of
/// discrete ids, so `2` never matches inside `12`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RecipientSet(BTreeSet<UserId>);

impl RecipientSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, id: UserId) -> bool {
        self.0.insert(id)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.0.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }

    /// Column form: ascending ids joined by the delimiter, `None` when empty.
    pub fn to_column(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        Some(parts.join(&RECIPIENT_DELIMITER.to_string()))
    }

    /// Strict parse of a stored column. Whitespace and empty segments are
    /// tolerated; anything else that is not an id is an error.
    pub fn try_from_column(raw: &str) -> Result<Self, ParseError> {
        let mut set = BTreeSet::new();
        for part in raw.split(RECIPIENT_DELIMITER) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            set.insert(part.parse::<UserId>()?);
        }
        Ok(Self(set))
    }

    /// Like [`try_from_column`](Self::try_from_column) but drops fragments
    /// that are not ids.
    pub fn from_column_lossy(raw: &str) -> Self {
        Self(
            raw.split(RECIPIENT_DELIMITER)
                .filter_map(|p| p.trim().parse::<UserId>().ok())
                .collect(),
        )
    }
}

impl FromIterator<UserId> for RecipientSet {
    fn from_iter<I: IntoIterator<Item = UserId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_round_trips_through_str() {
        for v in [Visibility::Private, Visibility::Shared, Visibility::Public] {
            assert_eq!(v.as_str().parse::<Visibility>().unwrap(), v);
        }
        assert!("friends".parse::<Visibility>().is_err());
    }

    #[test]
    fn recipient_column_is_sorted_and_deduplicated() {
        let set: RecipientSet = [UserId(12), UserId(3), UserId(12)].into_iter().collect();
        assert_eq!(set.to_column().as_deref(), Some("3,12"));
        assert_eq!(RecipientSet::new().to_column(), None);
    }

    #[test]
    fn recipient_membership_is_not_substring_match() {
        let set = RecipientSet::try_from_column("12, 21,").unwrap();
        assert!(set.contains(UserId(12)));
        assert!(set.contains(UserId(21)));
        assert!(!set.contains(UserId(2)));
        assert!(!set.contains(UserId(1)));
    }

    #[test]
    fn lossy_parse_skips_garbage() {
        assert!(RecipientSet::try_from_column("4,bob").is_err());
        let set = RecipientSet::from_column_lossy("4,bob");
        assert_eq!(set.len(), 1);
        assert!(set.contains(UserId(4)));
    }

    #[test]
    fn tenancy_accepts_boolean_spellings() {
        assert_eq!("true".parse::<Tenancy>().unwrap(), Tenancy::Multi);
        assert_eq!("Single".parse::<Tenancy>().unwrap(), Tenancy::Single);
        assert!("both".parse::<Tenancy>().is_err());
    }
}
