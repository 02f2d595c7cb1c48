//! Kubernetes naming rules applied to request fields before any I/O.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

use crate::errors::invalid_argument;

static DNS1035_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("static regex"));
static DNS1123_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex"));
static QUALIFIED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").expect("static regex"));

const DNS1035_LABEL_MAX: usize = 63;
const DNS1123_SUBDOMAIN_MAX: usize = 253;
const LABEL_VALUE_MAX: usize = 63;

pub fn is_dns1035_label(s: &str) -> bool {
    s.len() <= DNS1035_LABEL_MAX && DNS1035_LABEL.is_match(s)
}

pub fn is_dns1123_label(s: &str) -> bool {
    s.len() <= DNS1035_LABEL_MAX && DNS1123_LABEL.is_match(s)
}

pub fn is_dns1123_subdomain(s: &str) -> bool {
    s.len() <= DNS1123_SUBDOMAIN_MAX
        && !s.is_empty()
        && s.split('.').all(|part| DNS1123_LABEL.is_match(part))
}

/// Label values may be empty; otherwise a qualified name of at most 63 characters.
pub fn is_valid_label_value(s: &str) -> bool {
    s.is_empty() || (s.len() <= LABEL_VALUE_MAX && QUALIFIED_NAME.is_match(s))
}

/// `[prefix/]name`, the prefix being a DNS-1123 subdomain.
pub fn is_valid_label_name(s: &str) -> bool {
    match s.find('/') {
        Some(idx) if idx > 0 => is_dns1123_subdomain(&s[..idx]) && is_valid_label_value(&s[idx + 1..]),
        _ => is_valid_label_value(s),
    }
}

pub fn is_valid_label_names(labels: &BTreeMap<String, String>) -> bool {
    labels.keys().all(|k| is_valid_label_name(k))
}

pub fn is_valid_annotation_names(annotations: &BTreeMap<String, String>) -> bool {
    is_valid_label_names(annotations)
}

/// Fail with `InvalidArgument` unless `value` is a DNS-1035 label.
pub fn require_dns1035(kind: &str, value: &str) -> anyhow::Result<()> {
    if is_dns1035_label(value) {
        Ok(())
    } else {
        Err(invalid_argument(format!(
            "{kind} {value} is invalid, must be a DNS-1035 label"
        )))
    }
}

/// Name of an object the console writes: a label value, in a DNS-1123 namespace when namespaced.
pub fn require_object_name(name: &str, namespace: &str) -> anyhow::Result<()> {
    if name.is_empty() || !is_valid_label_value(name) {
        return Err(invalid_argument(format!("Failed to validate resource name {name}")));
    }
    if !namespace.is_empty() && !is_dns1123_label(namespace) {
        return Err(invalid_argument(format!("Failed to validate resource namespace {namespace}")));
    }
    Ok(())
}

pub fn require_labels(kind: &str, labels: &BTreeMap<String, String>) -> anyhow::Result<()> {
    if is_valid_label_names(labels) {
        Ok(())
    } else {
        Err(invalid_argument(format!("{kind} label {:?} is invalid", labels)))
    }
}

pub fn require_annotations(kind: &str, annotations: &BTreeMap<String, String>) -> anyhow::Result<()> {
    if is_valid_annotation_names(annotations) {
        Ok(())
    } else {
        Err(invalid_argument(format!("{kind} annotation {:?} is invalid", annotations)))
    }
}

/// Hook for `#[validate(custom(function = "validate_dns1035"))]`.
pub fn validate_dns1035(value: &str) -> Result<(), ValidationError> {
    if is_dns1035_label(value) {
        Ok(())
    } else {
        Err(ValidationError::new("dns1035_label"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns1035() {
        assert!(is_dns1035_label("local-cluster"));
        assert!(is_dns1035_label("a"));
        assert!(!is_dns1035_label("1abc"));
        assert!(!is_dns1035_label("Abc"));
        assert!(!is_dns1035_label("abc-"));
        assert!(!is_dns1035_label(""));
        assert!(!is_dns1035_label(&"a".repeat(64)));
    }

    #[test]
    fn test_dns1123_subdomain() {
        assert!(is_dns1123_subdomain("kantaloupe.dynamia.ai"));
        assert!(is_dns1123_subdomain("1abc"));
        assert!(!is_dns1123_subdomain("a..b"));
        assert!(!is_dns1123_subdomain("UPPER.case"));
    }

    #[test]
    fn test_label_names() {
        assert!(is_valid_label_name("app"));
        assert!(is_valid_label_name("app.kubernetes.io/managed-by"));
        assert!(is_valid_label_name("node-role.kubernetes.io/control-plane"));
        assert!(!is_valid_label_name("bad prefix/name"));
        assert!(!is_valid_label_name("-leading"));
    }

    #[test]
    fn test_require_helpers_return_invalid_argument() {
        let err = require_dns1035("cluster name", "Bad_Name").unwrap_err();
        let app = crate::errors::classify(err);
        assert_eq!(app.code(), "INVALID_ARGUMENT");

        let labels = BTreeMap::from([("ok/key".to_string(), "v".to_string())]);
        assert!(require_labels("cluster", &labels).is_ok());
        let bad = BTreeMap::from([("no spaces".to_string(), "v".to_string())]);
        assert!(require_annotations("cluster", &bad).is_err());
    }

    #[test]
    fn test_object_name() {
        assert!(require_object_name("app-config", "team-a").is_ok());
        assert!(require_object_name("pv-1", "").is_ok());
        assert!(require_object_name("", "team-a").is_err());
        assert!(require_object_name("app", "Team_A").is_err());
        assert!(is_dns1123_label("1team"));
    }
}
