//! Resource permission rows and their display joins

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::subject::Subject;

/// One grant on a resource instance, stored or synthesized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePermission {
    /// 0 for rows that are not stored (role-derived, license fallback)
    pub id: u64,
    pub resource_id: String,
    pub subject: Subject,
    pub actions: BTreeSet<String>,
    pub scope: String,
    /// Directly assigned through the service
    pub managed: bool,
    #[serde(default)]
    pub display: Display,
}

/// Joined by the store, never by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    /// User login or team name
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Directory entry for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub login: String,
    pub email: String,
}

/// Directory entry for a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl UserInfo {
    pub fn display(&self) -> Display {
        Display { name: Some(self.login.clone()), avatar_url: Some(gravatar_url(&self.email)) }
    }
}

impl TeamInfo {
    /// Teams without an email get an avatar seeded from their name
    pub fn display(&self) -> Display {
        let seed = if self.email.trim().is_empty() { &self.name } else { &self.email };
        Display { name: Some(self.name.clone()), avatar_url: Some(gravatar_url(seed)) }
    }
}

const GRAVATAR_BASE: &str = "https://secure.gravatar.com/avatar/";

/// Gravatar URL keyed by the SHA-256 of the normalized email
pub fn gravatar_url(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    format!("{}{}?s=512&d=retro", GRAVATAR_BASE, hex::encode(hasher.finalize()))
}

/// Hex encode
mod hex {
    pub fn encode(data: impl AsRef<[u8]>) -> String {
        data.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gravatar_normalizes_email() {
        let a = gravatar_url("Alice@Example.com ");
        assert_eq!(a, gravatar_url("alice@example.com"));
        assert!(a.starts_with(GRAVATAR_BASE));
        // 64 hex chars of sha-256
        let hash = &a[GRAVATAR_BASE.len()..a.find('?').unwrap()];
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn team_avatar_falls_back_to_name() {
        let t = TeamInfo { name: "ops".into(), email: String::new() };
        assert_eq!(t.display().avatar_url, Some(gravatar_url("ops")));
        assert_eq!(t.display().name.as_deref(), Some("ops"));
    }
}
