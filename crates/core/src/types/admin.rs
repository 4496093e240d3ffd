//! Administrator accounts the end-user can talk to.

use serde::{Deserialize, Serialize};

use super::id::{AdminId, IdError, document_id};

/// Fallback display name for admins without a name.
const FALLBACK_NAME: &str = "Admin";

/// A support-staff account.
///
/// Immutable from the client's perspective; sourced from the admin list
/// endpoint. The backend may omit `name` or `email`, in which case they are
/// empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireAdmin")]
pub struct Admin {
    /// Account id.
    #[serde(rename = "_id")]
    pub id: AdminId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
}

/// Admin as the backend sends it: `_id`, `id`, or both.
#[derive(Deserialize)]
struct WireAdmin {
    #[serde(rename = "_id")]
    underscore_id: Option<AdminId>,
    id: Option<AdminId>,
    name: Option<String>,
    email: Option<String>,
}

impl TryFrom<WireAdmin> for Admin {
    type Error = IdError;

    fn try_from(wire: WireAdmin) -> Result<Self, Self::Error> {
        Ok(Self {
            id: document_id(wire.underscore_id, wire.id)?,
            name: wire.name.unwrap_or_default(),
            email: wire.email.unwrap_or_default(),
        })
    }
}

impl Admin {
    /// Name to show in lists and notifications.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            FALLBACK_NAME
        } else {
            &self.name
        }
    }

    /// Single character shown in the avatar bubble.
    #[must_use]
    pub fn initial(&self) -> char {
        self.name.trim().chars().next().unwrap_or('A')
    }

    /// Case-insensitive substring match on name or email.
    ///
    /// `needle` must already be lowercased.
    fn matches_lowercase(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.email.to_lowercase().contains(needle)
    }
}

/// Filter admins by a search term.
///
/// Matching is a case-insensitive substring test over `name` or `email`. A
/// blank term (empty or whitespace) returns the full list unfiltered. A term
/// that matches nothing yields an empty list.
#[must_use]
pub fn filter_admins(admins: &[Admin], term: &str) -> Vec<Admin> {
    if term.trim().is_empty() {
        return admins.to_vec();
    }

    let needle = term.to_lowercase();
    admins
        .iter()
        .filter(|admin| admin.matches_lowercase(&needle))
        .cloned()
        .collect()
}
