//! Registry and access-key credentials, stored as labelled secrets in the local cluster.

use std::collections::BTreeMap;

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use k8s_openapi::ByteString;
use kube::ResourceExt;
use serde_json::json;
use tracing::{debug, info};

use crate::core::client::kube_resources::{ObjectMeta, Secret};
use crate::core::client::other_resources::{
    create_namespaced, delete_namespaced, fetch_namespaced, fetch_namespaced_by_name, replace_namespaced,
};
use crate::core::util::constants::{
    CREDENTIAL_TYPE_DOCKER_REGISTRY, CREDENTIAL_TYPE_LABEL_KEY, MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE,
};
use crate::core::util::sort::snake_to_camel;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::context::ServiceContext;
use crate::domain::credential::dto::credential_dto::{
    CredentialFilter, CredentialRequest, CredentialType, CredentialView, DOCKER_CONFIG_JSON_KEY,
    DOCKER_CONFIG_JSON_TYPE, OPAQUE_TYPE,
};
use crate::domain::resource::service::resource_service::ensure_consistent;
use crate::errors::{invalid_argument, is_not_found, AppError};

fn target_namespace<'a>(ctx: &'a ServiceContext, namespace: &'a str) -> &'a str {
    if namespace.is_empty() {
        &ctx.settings.namespace
    } else {
        namespace
    }
}

fn is_managed(secret: &Secret) -> bool {
    secret.labels().get(MANAGED_BY_LABEL_KEY).map(String::as_str) == Some(MANAGED_BY_LABEL_VALUE)
}

pub fn validate(req: &CredentialRequest) -> Result<()> {
    if req.name.is_empty() {
        return Err(invalid_argument("credential name cannot be empty"));
    }
    if req.type_ == CredentialType::Unspecified {
        return Err(invalid_argument("credential type cannot be unspecified"));
    }
    if req.data.is_empty() {
        return Err(invalid_argument("credential data cannot be empty"));
    }
    for key in req.type_.required_keys() {
        if req.data.get(*key).is_none_or(|v| v.is_empty()) {
            return Err(invalid_argument(format!("{} is required for {:?} credential", key, req.type_)));
        }
    }
    Ok(())
}

/// `{"auths": {server: {username, password, auth}}}` with `auth` = base64(user:pass).
pub fn docker_config_json(server: &str, username: &str, password: &str) -> Result<Vec<u8>> {
    let auth = STANDARD.encode(format!("{}:{}", username, password));
    let config = json!({
        "auths": {
            server: {
                "username": username,
                "password": password,
                "auth": auth,
            }
        }
    });
    Ok(serde_json::to_vec(&config)?)
}

/// Build the labelled secret for a validated request.
pub fn build_secret(req: &CredentialRequest, namespace: &str) -> Result<Secret> {
    validate(req)?;
    let field = |key: &str| req.data.get(key).map(String::as_str).unwrap_or_default();

    let mut labels = BTreeMap::from([(MANAGED_BY_LABEL_KEY.to_string(), MANAGED_BY_LABEL_VALUE.to_string())]);
    let mut secret = Secret {
        metadata: ObjectMeta {
            name: Some(req.name.clone()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    match req.type_ {
        CredentialType::DockerRegistry => {
            let config = docker_config_json(field("server"), field("username"), field("password"))?;
            secret.type_ = Some(DOCKER_CONFIG_JSON_TYPE.to_string());
            secret.data = Some(BTreeMap::from([(DOCKER_CONFIG_JSON_KEY.to_string(), ByteString(config))]));
            labels.insert(CREDENTIAL_TYPE_LABEL_KEY.to_string(), CREDENTIAL_TYPE_DOCKER_REGISTRY.to_string());
        }
        CredentialType::AccessKey => {
            secret.type_ = Some(OPAQUE_TYPE.to_string());
            secret.string_data = Some(BTreeMap::from([
                ("accessKey".to_string(), field("accessKey").to_string()),
                ("secretKey".to_string(), field("secretKey").to_string()),
            ]));
        }
        CredentialType::Unspecified => return Err(invalid_argument("credential type cannot be unspecified")),
    }
    secret.metadata.labels = Some(labels);
    Ok(secret)
}

fn list_selector(type_: CredentialType) -> String {
    let mut selector = format!("{}={}", MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE);
    if type_ == CredentialType::DockerRegistry {
        selector.push_str(&format!(",{}={}", CREDENTIAL_TYPE_LABEL_KEY, CREDENTIAL_TYPE_DOCKER_REGISTRY));
    }
    selector
}

// ==================== Operations ====================

/// An unspecified type lists every managed credential.
pub async fn list_credentials(ctx: &ServiceContext, filter: &CredentialFilter, opts: &ListOptions) -> Result<ListResponse<CredentialView>> {
    let client = ctx.local_client().await?;
    let selector = list_selector(filter.type_);
    let secrets: Vec<Secret> = fetch_namespaced(&client, &filter.namespace, Some(&selector)).await?;

    let views: Vec<CredentialView> = secrets
        .iter()
        .map(CredentialView::from)
        .filter(|v| match filter.type_ {
            CredentialType::Unspecified => v.type_ != CredentialType::Unspecified,
            wanted => v.type_ == wanted,
        })
        .collect();
    debug!("Discovered {} credential(s)", views.len());
    Ok(opts.apply(views, &snake_to_camel)?)
}

pub async fn get_credential(ctx: &ServiceContext, namespace: &str, name: &str) -> Result<CredentialView> {
    let client = ctx.local_client().await?;
    let namespace = target_namespace(ctx, namespace);
    let secret: Secret = fetch_namespaced_by_name(&client, namespace, name).await?;
    if !is_managed(&secret) {
        return Err(AppError::NotFound(format!("credential {}/{} not found", namespace, name)).into());
    }
    Ok(CredentialView::from(&secret))
}

pub async fn create_credential(ctx: &ServiceContext, req: &CredentialRequest) -> Result<CredentialView> {
    let client = ctx.local_client().await?;
    let namespace = target_namespace(ctx, &req.namespace);
    let secret = build_secret(req, namespace)?;

    let created = create_namespaced(&client, namespace, &secret).await?;
    info!("Created credential {}/{} ({:?})", namespace, req.name, req.type_);
    Ok(CredentialView::from(&created))
}

/// Rewrite the secret material, keeping the existing labels and annotations.
pub async fn update_credential(ctx: &ServiceContext, name: &str, req: &CredentialRequest) -> Result<CredentialView> {
    ensure_consistent("name", &req.name, name)?;
    let client = ctx.local_client().await?;
    let namespace = target_namespace(ctx, &req.namespace);
    let mut secret = build_secret(req, namespace)?;

    let existing: Secret = fetch_namespaced_by_name(&client, namespace, name).await?;
    let mut labels = existing.metadata.labels.clone().unwrap_or_default();
    labels.extend(secret.metadata.labels.take().unwrap_or_default());
    secret.metadata.labels = Some(labels);
    secret.metadata.annotations = existing.metadata.annotations.clone();
    secret.metadata.resource_version = existing.metadata.resource_version.clone();

    let updated = replace_namespaced(&client, namespace, &secret).await?;
    info!("Updated credential {}/{} ({:?})", namespace, name, req.type_);
    Ok(CredentialView::from(&updated))
}

/// Only managed credentials are deleted; a missing one is not an error.
pub async fn delete_credential(ctx: &ServiceContext, namespace: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid_argument("credential name cannot be empty"));
    }
    let client = ctx.local_client().await?;
    let namespace = target_namespace(ctx, namespace);

    let secret: Secret = match fetch_namespaced_by_name(&client, namespace, name).await {
        Ok(s) => s,
        Err(err) if is_not_found(&err) => {
            debug!("Credential {}/{} not found, skipping deletion", namespace, name);
            return Ok(());
        }
        Err(err) => return Err(err),
    };
    if !is_managed(&secret) || CredentialType::of(&secret) == CredentialType::Unspecified {
        debug!("Secret {}/{} is not a managed credential, skipping deletion", namespace, name);
        return Ok(());
    }

    match delete_namespaced::<Secret>(&client, namespace, name).await {
        Err(err) if !is_not_found(&err) => Err(err),
        _ => {
            info!("Deleted credential {}/{}", namespace, name);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(type_: CredentialType, data: &[(&str, &str)]) -> CredentialRequest {
        CredentialRequest {
            name: "harbor".into(),
            namespace: "team-a".into(),
            type_,
            data: data.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn test_docker_registry_secret() {
        let req = request(
            CredentialType::DockerRegistry,
            &[("server", "harbor.local"), ("username", "admin"), ("password", "pw")],
        );
        let secret = build_secret(&req, "team-a").unwrap();
        assert_eq!(secret.type_.as_deref(), Some(DOCKER_CONFIG_JSON_TYPE));
        let labels = secret.metadata.labels.clone().unwrap();
        assert_eq!(labels[CREDENTIAL_TYPE_LABEL_KEY], CREDENTIAL_TYPE_DOCKER_REGISTRY);
        assert_eq!(labels[MANAGED_BY_LABEL_KEY], MANAGED_BY_LABEL_VALUE);

        let raw = &secret.data.unwrap()[DOCKER_CONFIG_JSON_KEY].0;
        let config: serde_json::Value = serde_json::from_slice(raw).unwrap();
        let entry = &config["auths"]["harbor.local"];
        assert_eq!(entry["username"], "admin");
        assert_eq!(entry["auth"], STANDARD.encode("admin:pw"));
    }

    #[test]
    fn test_access_key_secret() {
        let req = request(CredentialType::AccessKey, &[("accessKey", "ak"), ("secretKey", "sk")]);
        let secret = build_secret(&req, "team-a").unwrap();
        assert_eq!(secret.type_.as_deref(), Some(OPAQUE_TYPE));
        assert_eq!(secret.string_data.unwrap()["secretKey"], "sk");
        assert!(!secret.metadata.labels.unwrap().contains_key(CREDENTIAL_TYPE_LABEL_KEY));
    }

    #[test]
    fn test_validation() {
        assert!(validate(&request(CredentialType::Unspecified, &[("a", "b")])).is_err());
        assert!(validate(&request(CredentialType::AccessKey, &[])).is_err());
        let missing = validate(&request(CredentialType::DockerRegistry, &[("server", "s"), ("username", "u")]));
        assert!(missing.unwrap_err().to_string().contains("password"));

        let mut unnamed = request(CredentialType::AccessKey, &[("accessKey", "a"), ("secretKey", "s")]);
        unnamed.name.clear();
        assert!(validate(&unnamed).is_err());
    }

    #[test]
    fn test_list_selector() {
        assert_eq!(list_selector(CredentialType::AccessKey), "app.kubernetes.io/managed-by=kantaloupe");
        assert_eq!(
            list_selector(CredentialType::DockerRegistry),
            "app.kubernetes.io/managed-by=kantaloupe,kantaloupe.io/credential-type=docker-registry"
        );
    }
}
