//! Length-prefixed key encoding for LMDB storage.
//!
//! All keys are encoded as: [len1][bytes1][len2][bytes2]...
//! - No delimiters, no escaping: scopes and role names may contain `:` or `/`
//! - A key built from the first N parts of another key is a scan prefix for it
//! - Each part is at most 255 bytes

use crate::error::{Error, Result};

/// Longest part a single length byte can describe
pub const MAX_PART_LEN: usize = u8::MAX as usize;

/// Build a length-prefixed key from parts
///
/// # Example
/// ```
/// let key = resperm::keys::build_key(&["dashboards", "42"]).unwrap();
/// assert_eq!(key, b"\x0adashboards\x0242".to_vec());
/// ```
pub fn build_key(parts: &[&str]) -> Result<Vec<u8>> {
    let total_len: usize = parts.iter().map(|p| 1 + p.len()).sum();
    let mut key = Vec::with_capacity(total_len);
    for part in parts {
        if part.len() > MAX_PART_LEN {
            return Err(Error::validation(format!(
                "key part exceeds {} bytes: {}...",
                MAX_PART_LEN,
                part.chars().take(16).collect::<String>()
            )));
        }
        key.push(part.len() as u8);
        key.extend_from_slice(part.as_bytes());
    }
    Ok(key)
}

/// Parse a length-prefixed key into parts. Truncated or non-UTF-8 parts end the parse.
pub fn parse_key(bytes: &[u8]) -> Vec<&str> {
    let mut parts = Vec::with_capacity(4);
    let mut i = 0;
    while i < bytes.len() {
        let len = bytes[i] as usize;
        if i + 1 + len > bytes.len() {
            break;
        }
        match std::str::from_utf8(&bytes[i + 1..i + 1 + len]) {
            Ok(part) => parts.push(part),
            Err(_) => break,
        }
        i += 1 + len;
    }
    parts
}

/// Get the Nth part from a key without allocating
pub fn get_part(bytes: &[u8], n: usize) -> Option<&str> {
    let mut i = 0;
    let mut count = 0;
    while i < bytes.len() {
        let len = bytes[i] as usize;
        if i + 1 + len > bytes.len() {
            return None;
        }
        if count == n {
            return std::str::from_utf8(&bytes[i + 1..i + 1 + len]).ok();
        }
        i += 1 + len;
        count += 1;
    }
    None
}

// ============================================================================
// Table keys
// ============================================================================

/// Managed grant: [resource][resource_id][subject kind][subject id]
pub fn permission_key(resource: &str, resource_id: &str, kind: &str, subject_id: &str) -> Result<Vec<u8>> {
    build_key(&[resource, resource_id, kind, subject_id])
}

/// Scan prefix covering every managed grant on one resource instance.
/// Also the key of the instance's row in the parents table.
pub fn resource_key(resource: &str, resource_id: &str) -> Result<Vec<u8>> {
    build_key(&[resource, resource_id])
}

/// Role-derived grant: [role][action][scope]
pub fn role_grant_key(role: &str, action: &str, scope: &str) -> Result<Vec<u8>> {
    build_key(&[role, action, scope])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_parse() {
        let key = build_key(&["dashboards", "42", "user", "7"]).unwrap();
        assert_eq!(parse_key(&key), vec!["dashboards", "42", "user", "7"]);
    }

    #[test]
    fn test_get_part() {
        let key = role_grant_key("Editor", "dashboards:read", "dashboards:*").unwrap();
        assert_eq!(get_part(&key, 0), Some("Editor"));
        assert_eq!(get_part(&key, 2), Some("dashboards:*"));
        assert_eq!(get_part(&key, 3), None);
    }

    #[test]
    fn test_resource_prefix() {
        let key = permission_key("dashboards", "42", "team", "3").unwrap();
        assert!(key.starts_with(&resource_key("dashboards", "42").unwrap()));
        // "4" must not be a prefix of "42"
        assert!(!key.starts_with(&resource_key("dashboards", "4").unwrap()));
    }

    #[test]
    fn test_special_chars() {
        let key = build_key(&["Grafana Admin", "folders:uid:a/b", "x\\y"]).unwrap();
        assert_eq!(parse_key(&key), vec!["Grafana Admin", "folders:uid:a/b", "x\\y"]);
    }

    #[test]
    fn test_oversized_part_rejected() {
        let long = "a".repeat(256);
        assert!(matches!(build_key(&[&long]), Err(Error::Validation(_))));
        assert!(build_key(&[&"a".repeat(255)]).is_ok());
    }
}
