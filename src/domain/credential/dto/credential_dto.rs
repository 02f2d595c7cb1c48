use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::client::kube_resources::Secret;
use crate::core::util::filter::HasName;
use crate::domain::common::model::meta::unix_seconds;

pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";
pub const OPAQUE_TYPE: &str = "Opaque";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialType {
    #[default]
    #[serde(rename = "CREDENTIAL_TYPE_UNSPECIFIED")]
    Unspecified,
    DockerRegistry,
    AccessKey,
}

impl CredentialType {
    /// Keys a request's `data` must carry for this type.
    pub fn required_keys(self) -> &'static [&'static str] {
        match self {
            CredentialType::Unspecified => &[],
            CredentialType::DockerRegistry => &["server", "username", "password"],
            CredentialType::AccessKey => &["accessKey", "secretKey"],
        }
    }

    /// Read back from the stored secret.
    pub fn of(secret: &Secret) -> Self {
        if secret.type_.as_deref() == Some(DOCKER_CONFIG_JSON_TYPE) {
            CredentialType::DockerRegistry
        } else if secret.data.as_ref().is_some_and(|d| d.contains_key("accessKey")) {
            CredentialType::AccessKey
        } else {
            CredentialType::Unspecified
        }
    }
}

/// `?type=&namespace=` on the credential list.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFilter {
    #[serde(default, rename = "type")]
    pub type_: CredentialType,
    #[serde(default)]
    pub namespace: String,
}

/// Body of a credential create or update; `data` values are plain text.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, rename = "type")]
    pub type_: CredentialType,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// What the console shows of a credential. Secret material is never returned.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: CredentialType,
    pub namespace: String,
    pub created_time: i64,
    pub labels: BTreeMap<String, String>,
}

impl From<&Secret> for CredentialView {
    fn from(secret: &Secret) -> Self {
        Self {
            name: secret.metadata.name.clone().unwrap_or_default(),
            type_: CredentialType::of(secret),
            namespace: secret.metadata.namespace.clone().unwrap_or_default(),
            created_time: unix_seconds(secret.metadata.creation_timestamp.as_ref()),
            labels: secret.metadata.labels.clone().unwrap_or_default(),
        }
    }
}

impl HasName for CredentialView {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;

    #[test]
    fn test_type_from_json() {
        let req: CredentialRequest = serde_json::from_value(serde_json::json!({
            "name": "harbor",
            "type": "DOCKER_REGISTRY",
            "data": {"server": "harbor.local"}
        }))
        .unwrap();
        assert_eq!(req.type_, CredentialType::DockerRegistry);

        let filter: CredentialFilter = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(filter.type_, CredentialType::Unspecified);
    }

    #[test]
    fn test_type_of_secret() {
        let mut secret = Secret::default();
        assert_eq!(CredentialType::of(&secret), CredentialType::Unspecified);

        secret.data = Some(BTreeMap::from([("accessKey".to_string(), ByteString(b"ak".to_vec()))]));
        assert_eq!(CredentialType::of(&secret), CredentialType::AccessKey);

        secret.type_ = Some(DOCKER_CONFIG_JSON_TYPE.to_string());
        assert_eq!(CredentialType::of(&secret), CredentialType::DockerRegistry);
    }
}
