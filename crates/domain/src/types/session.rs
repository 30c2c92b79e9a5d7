//! Authenticated session and identity types

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{ADMIN_GROUP, OPERATOR_GROUP};

/// Profile of the signed-in user as reported by the login endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl Identity {
    /// "First Last", falling back to the username when both are blank
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// The single authenticated session of this process
///
/// Permission data is advisory: the server enforces authorization, the
/// client only uses it to hide controls.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Short-lived token presented on every request
    pub bearer_credential: String,

    /// Longer-lived token exchanged for a fresh bearer credential
    #[serde(default)]
    pub renewal_credential: Option<String>,

    pub identity: Identity,

    #[serde(default)]
    pub permission_groups: BTreeSet<String>,

    /// Server-side superuser flag
    #[serde(default)]
    pub is_privileged: bool,

    pub authenticated_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn new(
        bearer_credential: String,
        renewal_credential: Option<String>,
        identity: Identity,
        permission_groups: impl IntoIterator<Item = String>,
        is_privileged: bool,
    ) -> Self {
        Self {
            bearer_credential,
            renewal_credential,
            identity,
            permission_groups: permission_groups.into_iter().collect(),
            is_privileged,
            authenticated_at: Utc::now(),
        }
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.permission_groups.contains(group)
    }

    /// Superusers and members of the `admin` group
    pub fn is_admin(&self) -> bool {
        self.is_privileged || self.has_group(ADMIN_GROUP)
    }

    /// Admins and members of the `operator` group may mutate documents
    pub fn can_edit(&self) -> bool {
        self.is_admin() || self.has_group(OPERATOR_GROUP)
    }

    /// Replace the credentials after a renewal.
    ///
    /// A `None` renewal credential keeps the current one: servers that do
    /// not rotate renewal tokens only return a new bearer.
    pub fn renew(&mut self, bearer_credential: String, renewal_credential: Option<String>) {
        self.bearer_credential = bearer_credential;
        if renewal_credential.is_some() {
            self.renewal_credential = renewal_credential;
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("bearer_credential", &"[redacted]")
            .field("renewal_credential", &self.renewal_credential.as_ref().map(|_| "[redacted]"))
            .field("identity", &self.identity)
            .field("permission_groups", &self.permission_groups)
            .field("is_privileged", &self.is_privileged)
            .field("authenticated_at", &self.authenticated_at)
            .finish()
    }
}
