//! Per-admin unread message counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::admin::Admin;
use super::id::AdminId;

/// Mapping from admin id to the number of admin-originated messages the user
/// has not yet viewed.
///
/// ## Constraints
///
/// - Every stored count is positive. A counter that would drop to zero is
///   removed entirely instead.
/// - Serializes as a plain JSON object (`{"<adminId>": count}`), the same
///   shape the backend's unread summary uses.
///
/// Deserialization is lenient: `null`, zero, and negative values are dropped,
/// which lets a hand-edited or partially written file load cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UnreadCounts(BTreeMap<AdminId, u32>);

impl UnreadCounts {
    /// Create an empty counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for an admin (zero when absent).
    #[must_use]
    pub fn get(&self, admin: &AdminId) -> u32 {
        self.0.get(admin).copied().unwrap_or(0)
    }

    /// Whether the admin has an entry.
    #[must_use]
    pub fn contains(&self, admin: &AdminId) -> bool {
        self.0.contains_key(admin)
    }

    /// Add `by` to an admin's counter. Adding zero is a no-op.
    pub fn increment(&mut self, admin: &AdminId, by: u32) {
        if by == 0 {
            return;
        }
        let entry = self.0.entry(admin.clone()).or_insert(0);
        *entry = entry.saturating_add(by);
    }

    /// Remove an admin's counter. Returns true if an entry existed.
    pub fn remove(&mut self, admin: &AdminId) -> bool {
        self.0.remove(admin).is_some()
    }

    /// Drop counters for admins not in `admins`.
    pub fn retain_known(&mut self, admins: &[Admin]) {
        self.0
            .retain(|id, _| admins.iter().any(|admin| &admin.id == id));
    }

    /// Sum of all counters.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().map(|&count| u64::from(count)).sum()
    }

    /// Number of admins with unread messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no admin has unread messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(admin, count)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&AdminId, u32)> {
        self.0.iter().map(|(id, &count)| (id, count))
    }
}

impl FromIterator<(AdminId, u32)> for UnreadCounts {
    fn from_iter<I: IntoIterator<Item = (AdminId, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|(_, count)| *count > 0).collect())
    }
}

impl<'de> Deserialize<'de> for UnreadCounts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<AdminId, Option<i64>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(id, count)| {
                let count = u32::try_from(count?).ok()?;
                Some((id, count))
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_remove() {
        let mut counts = UnreadCounts::new();
        let admin = AdminId::new("a1");

        counts.increment(&admin, 2);
        counts.increment(&admin, 3);
        assert_eq!(counts.get(&admin), 5);

        assert!(counts.remove(&admin));
        assert!(!counts.contains(&admin));
        assert!(!counts.remove(&admin));
    }

    #[test]
    fn test_increment_by_zero_creates_no_entry() {
        let mut counts = UnreadCounts::new();
        counts.increment(&AdminId::new("a1"), 0);
        assert!(counts.is_empty());
    }

    #[test]
    fn test_lenient_deserialize() {
        let json = r#"{"a1": 3, "a2": 0, "a3": null, "a4": -2}"#;
        let counts: UnreadCounts = serde_json::from_str(json).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get(&AdminId::new("a1")), 3);
    }

    #[test]
    fn test_serializes_as_object() {
        let counts: UnreadCounts = [(AdminId::new("a1"), 4), (AdminId::new("a2"), 0)]
            .into_iter()
            .collect();
        assert_eq!(serde_json::to_string(&counts).unwrap(), r#"{"a1":4}"#);
    }

    #[test]
    fn test_retain_known() {
        let mut counts: UnreadCounts = [(AdminId::new("a1"), 1), (AdminId::new("gone"), 9)]
            .into_iter()
            .collect();
        let admins = vec![Admin {
            id: AdminId::new("a1"),
            name: String::new(),
            email: String::new(),
        }];
        counts.retain_known(&admins);
        assert_eq!(counts.total(), 1);
    }
}
