//! Label and annotation handling: ownership marker, format rules, and the
//! deterministic merge of common and section-specific metadata.
//!
//! Merge precedence, low to high: common < specific < ownership marker.
//! Collisions between common and specific maps are conflicts (the validator
//! reports them all at once); the marker always wins and is applied last.

use std::collections::BTreeMap;

use crate::error::{Error, Violation};

/// Reserved label carrying the owning release's name.
///
/// This marker is the only signal consulted when deciding whether an existing
/// object is safe to update or delete.
pub const RELEASE_LABEL: &str = "stevedore.io/release";

/// Conventional name label attached to every synthesized object.
///
/// Unlike the release marker, a user-supplied value for this key wins.
pub const NAME_LABEL: &str = "app.kubernetes.io/name";

/// Prefix reserved for this tool; user-supplied keys may not use it
pub const RESERVED_PREFIX: &str = "stevedore.io/";

/// Keys present in both maps, in deterministic order.
///
/// The validator turns each of these into a violation; [`merge_labels`]
/// refuses to merge while any exist.
pub fn conflicting_keys(
    common: &BTreeMap<String, String>,
    specific: &BTreeMap<String, String>,
) -> Vec<String> {
    common
        .keys()
        .filter(|k| specific.contains_key(*k))
        .cloned()
        .collect()
}

/// Merge labels for one synthesized object.
///
/// Output contains every key from both maps plus the ownership marker, which
/// overwrites any user-supplied value for its reserved key. Returns an error
/// when common and specific share a key; callers that validated the release
/// first never see it.
pub fn merge_labels(
    release: &str,
    common: &BTreeMap<String, String>,
    specific: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, Error> {
    let mut merged = merge_annotations(common, specific)?;
    merged.insert(RELEASE_LABEL.to_string(), release.to_string());
    Ok(merged)
}

/// Merge annotations for one synthesized object.
///
/// Same precedence as [`merge_labels`] but with no identity key to apply.
pub fn merge_annotations(
    common: &BTreeMap<String, String>,
    specific: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, Error> {
    let conflicts = conflicting_keys(common, specific);
    if !conflicts.is_empty() {
        return Err(Error::validation(
            "unknown",
            conflicts
                .into_iter()
                .map(|k| Violation::new(k, "declared in both common and a specific section"))
                .collect(),
        ));
    }
    let mut merged = common.clone();
    merged.extend(specific.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(merged)
}

/// Validate a label or annotation key.
///
/// Keys are an optional DNS-subdomain prefix, a `/`, and a name of 1-63
/// characters from `[A-Za-z0-9._-]` starting and ending alphanumeric.
pub fn validate_label_key(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.split_once('/') {
        Some((p, n)) => (Some(p), n),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        if prefix.is_empty() {
            return Err("key prefix is empty".to_string());
        }
        if prefix.len() > 253 {
            return Err("key prefix exceeds 253 characters".to_string());
        }
        for part in prefix.split('.') {
            validate_name_part(part).map_err(|e| format!("key prefix: {e}"))?;
        }
    }
    if name.is_empty() {
        return Err("key name is empty".to_string());
    }
    if name.len() > 63 {
        return Err("key name exceeds 63 characters".to_string());
    }
    if !name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        || !name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err("key name must start and end with an alphanumeric character".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(
            "key name may only contain alphanumeric characters, '.', '_', and '-'".to_string(),
        );
    }
    Ok(())
}

/// Validate a label value: empty, or 1-63 characters of `[A-Za-z0-9._-]`
/// starting and ending alphanumeric.
pub fn validate_label_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > 63 {
        return Err("value exceeds 63 characters".to_string());
    }
    if !value.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        || !value.chars().last().is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err("value must start and end with an alphanumeric character".to_string());
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(
            "value may only contain alphanumeric characters, '.', '_', and '-'".to_string(),
        );
    }
    Ok(())
}

/// True when the key sits under the tool's reserved prefix
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

fn validate_name_part(part: &str) -> Result<(), String> {
    if part.is_empty() {
        return Err("contains an empty DNS segment".to_string());
    }
    if !part.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        || !part.chars().last().is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err(format!(
            "segment '{part}' must start and end with an alphanumeric character"
        ));
    }
    if !part
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(format!(
            "segment '{part}' may only contain lowercase alphanumeric characters and '-'"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn merge_is_total_over_disjoint_maps() {
        let common = map(&[("env", "prod"), ("team", "infra")]);
        let specific = map(&[("tier", "web")]);

        let merged = merge_labels("myapp", &common, &specific).unwrap();
        assert_eq!(merged.get("env"), Some(&"prod".to_string()));
        assert_eq!(merged.get("team"), Some(&"infra".to_string()));
        assert_eq!(merged.get("tier"), Some(&"web".to_string()));
        assert_eq!(merged.get(RELEASE_LABEL), Some(&"myapp".to_string()));
    }

    #[test]
    fn marker_overwrites_user_supplied_reserved_key() {
        let common = BTreeMap::new();
        let specific = map(&[(RELEASE_LABEL, "sneaky")]);

        let merged = merge_labels("myapp", &common, &specific).unwrap();
        assert_eq!(merged.get(RELEASE_LABEL), Some(&"myapp".to_string()));
    }

    #[test]
    fn common_specific_collision_is_a_conflict() {
        let common = map(&[("env", "prod")]);
        let specific = map(&[("env", "prod")]);

        assert!(merge_labels("myapp", &common, &specific).is_err());
        assert_eq!(conflicting_keys(&common, &specific), vec!["env"]);
    }

    #[test]
    fn merge_is_deterministic() {
        let common = map(&[("b", "2"), ("a", "1")]);
        let specific = map(&[("c", "3")]);

        let first = merge_labels("myapp", &common, &specific).unwrap();
        let second = merge_labels("myapp", &common, &specific).unwrap();
        assert_eq!(first, second);
        let keys: Vec<&String> = first.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn label_key_rules() {
        assert!(validate_label_key("env").is_ok());
        assert!(validate_label_key("app.kubernetes.io/name").is_ok());
        assert!(validate_label_key("team_name-1").is_ok());

        assert!(validate_label_key("").is_err());
        assert!(validate_label_key("-leading").is_err());
        assert!(validate_label_key("trailing-").is_err());
        assert!(validate_label_key("ha s/space").is_err());
        assert!(validate_label_key(&"x".repeat(64)).is_err());
    }

    #[test]
    fn label_value_rules() {
        assert!(validate_label_value("").is_ok());
        assert!(validate_label_value("prod").is_ok());
        assert!(validate_label_value("v1.2.3").is_ok());

        assert!(validate_label_value("-bad").is_err());
        assert!(validate_label_value("has space").is_err());
        assert!(validate_label_value(&"x".repeat(64)).is_err());
    }

    #[test]
    fn reserved_prefix_detection() {
        assert!(is_reserved_key("stevedore.io/release"));
        assert!(is_reserved_key("stevedore.io/anything"));
        assert!(!is_reserved_key("app.kubernetes.io/name"));
    }
}
