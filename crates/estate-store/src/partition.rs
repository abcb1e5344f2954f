use std::fmt;

use estate_types::{Collection, Organization};
use serde::{Deserialize, Serialize};

/// Visibility tier of a stored value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Partition {
    /// Replicated to and readable by every organization.
    Shared,
    /// Replicated only to the collection's member organizations.
    Private(Collection),
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::Private(c) => write!(f, "{c}"),
        }
    }
}

/// Fully qualified location of a value: partition plus encoded composite key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub partition: Partition,
    pub key: String,
}

impl StateKey {
    pub fn new(partition: Partition, key: impl Into<String>) -> Self {
        Self {
            partition,
            key: key.into(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Encoded keys use NUL separators; render them readably.
        write!(f, "{}:{}", self.partition, self.key.trim_matches('\u{0}').replace('\u{0}', "/"))
    }
}

/// A committed value and the height of the commit that wrote it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: u64,
}

// ---------------------------------------------------------------------------
// Collection membership
// ---------------------------------------------------------------------------

/// Member list override for one collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMembers {
    pub collection: Collection,
    pub members: Vec<Organization>,
}

/// Which organizations may read and write each private partition.
///
/// Collections without an override use
/// [`Collection::default_members`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionPolicy {
    #[serde(default)]
    pub overrides: Vec<CollectionMembers>,
}

impl CollectionPolicy {
    pub fn new(overrides: Vec<CollectionMembers>) -> Self {
        Self { overrides }
    }

    pub fn members(&self, collection: Collection) -> &[Organization] {
        self.overrides
            .iter()
            .rev()
            .find(|o| o.collection == collection)
            .map(|o| o.members.as_slice())
            .unwrap_or_else(|| collection.default_members())
    }

    pub fn is_member(&self, collection: Collection, organization: Organization) -> bool {
        self.members(collection).contains(&organization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_uses_collection_defaults() {
        let policy = CollectionPolicy::default();
        assert!(policy.is_member(Collection::UserData, Organization::ThirdParty));
        assert!(!policy.is_member(Collection::TransactionPrivate, Organization::ThirdParty));
    }

    #[test]
    fn override_replaces_members() {
        let policy = CollectionPolicy::new(vec![CollectionMembers {
            collection: Collection::RealEstatePrivate,
            members: vec![Organization::Government],
        }]);
        assert!(policy.is_member(Collection::RealEstatePrivate, Organization::Government));
        assert!(!policy.is_member(Collection::RealEstatePrivate, Organization::Bank));
        // Untouched collections keep their defaults.
        assert!(policy.is_member(Collection::TransactionPrivate, Organization::Bank));
    }

    #[test]
    fn state_key_display_is_readable() {
        let key = StateKey::new(Partition::Shared, "\u{0}RE\u{0}C1\u{0}");
        assert_eq!(key.to_string(), "shared:RE/C1");
        let key = StateKey::new(Partition::Private(Collection::UserData), "\u{0}US\u{0}h\u{0}");
        assert_eq!(key.to_string(), "UserDataCollection:US/h");
    }

    #[test]
    fn shared_sorts_before_private() {
        assert!(Partition::Shared < Partition::Private(Collection::UserData));
    }
}
