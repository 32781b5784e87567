//! Scope strings: `<resource>:<attribute>:<value>`.
//!
//! A scope may carry `{{name}}` placeholders that are substituted from the
//! request parameters right before evaluation. Granted scopes may end with a
//! single `*` wildcard (`*`, `dashboards:*`, `dashboards:uid:*`).

use std::collections::HashMap;

/// Matches every scope
pub const WILDCARD: &str = "*";

/// Request-bound parameter values (`:resourceID`, inherited scope prefixes, ...)
pub type Parameters = HashMap<String, String>;

/// Prefixes have at most this many `:`-separated parts before the value
const MAX_PREFIX_PARTS: usize = 2;

/// Join scope parts: `scope(&["dashboards", "uid", "42"]) == "dashboards:uid:42"`
pub fn scope(parts: &[&str]) -> String {
    parts.join(":")
}

/// Placeholder resolved from the request parameters at evaluation time
pub fn parameter(name: &str) -> String {
    format!("{{{{{}}}}}", name)
}

/// Everything up to and including the last separator of the value:
/// `folders:uid:abc` -> `folders:uid:`
pub fn scope_prefix(scope: &str) -> String {
    let mut parts: Vec<&str> = scope.split(':').collect();
    if parts.len() > MAX_PREFIX_PARTS + 1 {
        parts.truncate(MAX_PREFIX_PARTS);
        parts.push("");
    } else if let Some(last) = parts.last_mut() {
        *last = "";
    }
    parts.join(":")
}

/// Substitute every placeholder in `pattern`. `None` if a placeholder has no value.
pub fn resolve(pattern: &str, params: &Parameters) -> Option<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + 2 + len];
        out.push_str(params.get(name)?);
        rest = &rest[start + 2 + len + 2..];
    }
    out.push_str(rest);
    Some(out)
}

/// A `*` is only allowed as the last character
pub fn is_valid(scope: &str) -> bool {
    match scope.find('*') {
        Some(i) => i == scope.len() - 1,
        None => true,
    }
}

/// Does a granted scope cover the target scope?
pub fn matches(granted: &str, target: &str) -> bool {
    if granted.is_empty() || !is_valid(granted) {
        return false;
    }
    match granted.strip_suffix('*') {
        Some(prefix) => target.starts_with(prefix),
        None => granted == target,
    }
}
