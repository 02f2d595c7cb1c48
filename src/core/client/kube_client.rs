use std::time::Duration;

use anyhow::{anyhow, Result};
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the local (control) cluster.
///
/// An explicit kubeconfig path wins; otherwise `KUBECONFIG`, `~/.kube/config` and the
/// in-cluster service account are tried in that order.
pub async fn build_local_client(kubeconfig_path: Option<&str>) -> Result<Client> {
    let mut config = match kubeconfig_path.filter(|p| !p.is_empty()) {
        Some(path) => {
            debug!("Using kubeconfig at {}", path);
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => {
            debug!("Inferring kubeconfig from environment");
            Config::infer().await?
        }
    };
    config.connect_timeout = Some(CONNECT_TIMEOUT);
    config.read_timeout = Some(READ_TIMEOUT);

    let client = Client::try_from(config)?;
    debug!("Kubernetes client initialized successfully");
    Ok(client)
}

/// Client for a member cluster from raw kubeconfig YAML.
pub async fn client_from_kubeconfig(yaml: &str) -> Result<Client> {
    let kubeconfig =
        Kubeconfig::from_yaml(yaml).map_err(|e| anyhow!("failed to parse kubeconfig: {}", e))?;
    let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| anyhow!("failed to load kubeconfig: {}", e))?;
    config.connect_timeout = Some(CONNECT_TIMEOUT);
    config.read_timeout = Some(READ_TIMEOUT);
    Ok(Client::try_from(config)?)
}

/// `GET /version`, used as a reachability check.
pub async fn server_version(client: &Client) -> Result<Info> {
    let info = client.apiserver_version().await?;
    debug!("Server version {}", info.git_version);
    Ok(info)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    use http::{Method, Request, Response, StatusCode};
    use kube::client::Body;
    use kube::Client;
    use serde_json::{json, Value};

    /// Requests a stub API server answered, as `"METHOD /path"`.
    pub type RequestLog = Arc<Mutex<Vec<String>>>;

    /// A client whose API server answers from `route`. Unrouted requests get a 404 `Status`.
    pub fn stub_client<F>(route: F) -> (Client, RequestLog)
    where
        F: Fn(&Method, &str) -> Option<Value> + Send + Sync + 'static,
    {
        let log = RequestLog::default();
        let seen = log.clone();
        let route = Arc::new(route);
        let service = tower::service_fn(move |req: Request<Body>| {
            let path = req.uri().path().to_string();
            seen.lock().unwrap().push(format!("{} {}", req.method(), path));
            let response = match route(req.method(), &path) {
                Some(body) => Response::new(Body::from(body.to_string().into_bytes())),
                None => {
                    let status = json!({
                        "kind": "Status",
                        "apiVersion": "v1",
                        "metadata": {},
                        "status": "Failure",
                        "message": format!("{} not found", path),
                        "reason": "NotFound",
                        "code": 404
                    });
                    let mut resp = Response::new(Body::from(status.to_string().into_bytes()));
                    *resp.status_mut() = StatusCode::NOT_FOUND;
                    resp
                }
            };
            async move { Ok::<_, Infallible>(response) }
        });
        (Client::new(service, "default"), log)
    }

    pub fn requests(log: &RequestLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{requests, stub_client};
    use super::*;
    use crate::core::client::namespaces::fetch_kube_system_uid;
    use crate::errors::is_not_found;
    use http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_malformed_kubeconfig_is_rejected() {
        let err = client_from_kubeconfig("clusters: [").await.err().unwrap();
        assert!(err.to_string().contains("kubeconfig"));
    }

    #[tokio::test]
    async fn test_stub_server_answers_and_records() {
        let (client, log) = stub_client(|method, path| match (method, path) {
            (&Method::GET, "/api/v1/namespaces/kube-system") => Some(json!({
                "apiVersion": "v1",
                "kind": "Namespace",
                "metadata": {"name": "kube-system", "uid": "uid-1"}
            })),
            _ => None,
        });
        assert_eq!(fetch_kube_system_uid(&client).await.unwrap(), "uid-1");

        let missing = crate::core::client::nodes::fetch_nodes(&client).await.unwrap_err();
        assert!(is_not_found(&missing));
        assert_eq!(requests(&log), vec!["GET /api/v1/namespaces/kube-system", "GET /api/v1/nodes"]);
    }
}
