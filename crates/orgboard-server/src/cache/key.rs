//! Deterministic cache key derivation.
//!
//! A key names one cacheable response variant:
//!
//! ```text
//! <prefix>:<controller>:<action>[:org=<id>][:<name>=<value>...]
//! ```
//!
//! Parameter segments are sorted case-insensitively by name, so two
//! logically identical requests with differently ordered query strings
//! collide on the same key. The organization segment is the tenant
//! isolation boundary: it is emitted whenever an organization context was
//! resolved, and its omission for org-less requests keeps those from
//! colliding with any tenant's entries.

use chrono::NaiveDate;
use uuid::Uuid;

/// Prefix used when the configured one is empty.
pub const DEFAULT_KEY_PREFIX: &str = "redis:cache";

const SEPARATOR: char = ':';

/// A request parameter value as it appears in a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Absent/null value; serializes as the literal `null`.
    Null,
    /// Calendar date; serializes as `YYYY-MM-DD` regardless of any
    /// sub-day precision the request carried.
    Date(NaiveDate),
    /// Anything else, in its natural string form.
    Text(String),
}

impl ParamValue {
    /// Classifies a raw query-string value.
    ///
    /// Values that parse as a date or timestamp are normalized to a
    /// calendar date so that `from=2024-05-01` and
    /// `from=2024-05-01T09:30:00Z` key identically. An empty value is
    /// treated as null.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Null;
        }
        if let Ok(date) = raw.parse::<NaiveDate>() {
            return Self::Date(date);
        }
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
            return Self::Date(dt.date_naive());
        }
        if let Ok(dt) = raw.parse::<chrono::NaiveDateTime>() {
            return Self::Date(dt.date());
        }
        Self::Text(raw.to_string())
    }

    fn render(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Derives the cache key for one controller/action invocation.
///
/// `prefix` falls back to [`DEFAULT_KEY_PREFIX`] when empty. The
/// organization segment is included only when `organization_id` is
/// present; parameters are sorted case-insensitively by name before being
/// appended as `name=value` segments.
#[must_use]
pub fn derive_key(
    prefix: &str,
    controller: &str,
    action: &str,
    organization_id: Option<Uuid>,
    params: &[(String, ParamValue)],
) -> String {
    let prefix = if prefix.is_empty() {
        DEFAULT_KEY_PREFIX
    } else {
        prefix
    };

    let mut key = String::with_capacity(64);
    key.push_str(prefix);
    key.push(SEPARATOR);
    key.push_str(controller);
    key.push(SEPARATOR);
    key.push_str(action);

    if let Some(org) = organization_id {
        key.push(SEPARATOR);
        key.push_str("org=");
        key.push_str(&org.to_string());
    }

    let mut sorted: Vec<&(String, ParamValue)> = params.iter().collect();
    sorted.sort_by(|a, b| {
        a.0.to_ascii_lowercase()
            .cmp(&b.0.to_ascii_lowercase())
            .then_with(|| a.0.cmp(&b.0))
    });

    for (name, value) in sorted {
        key.push(SEPARATOR);
        key.push_str(name);
        key.push('=');
        key.push_str(&value.render());
    }

    key
}
