use std::env;
use std::fs;

use crate::core::util::constants::DEFAULT_NAMESPACE;

const SERVICE_ACCOUNT_NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Namespace this process runs in: `POD_NAMESPACE`, then the service-account file.
pub fn current_namespace() -> Option<String> {
    if let Ok(ns) = env::var("POD_NAMESPACE") {
        if !ns.is_empty() {
            return Some(ns);
        }
    }
    fs::read_to_string(SERVICE_ACCOUNT_NAMESPACE_FILE)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn current_namespace_or_default() -> String {
    current_namespace().unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}
