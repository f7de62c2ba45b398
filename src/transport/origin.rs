//! Allow list for pages that may open an external connection.

use serde::{Deserialize, Serialize};

/// Origins are matched exactly, or by `scheme://*.domain` for any subdomain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed.iter().any(|pattern| matches(pattern, origin))
    }
}

fn matches(pattern: &str, origin: &str) -> bool {
    let pattern = pattern.trim_end_matches('/');
    let Some((scheme, host)) = pattern.split_once("://") else {
        return false;
    };

    match host.strip_prefix("*.") {
        Some(domain) => origin
            .strip_prefix(scheme)
            .and_then(|rest| rest.strip_prefix("://"))
            .and_then(|rest| rest.strip_suffix(domain))
            .is_some_and(|sub| sub.ends_with('.') && sub.len() > 1),
        None => pattern == origin,
    }
}
