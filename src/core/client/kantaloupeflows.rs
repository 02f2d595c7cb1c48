use anyhow::Result;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, error};

use crate::core::crd::kantaloupeflow::KantaloupeFlow;
use crate::core::util::constants::SELECT_ALL;

/// Fetch kantaloupeflows in a namespace, or everywhere for an empty namespace or `__ALL__`
pub async fn fetch_kantaloupeflows(client: &Client, namespace: &str) -> Result<Vec<KantaloupeFlow>> {
    let flows: Api<KantaloupeFlow> = if namespace.is_empty() || namespace == SELECT_ALL {
        Api::all(client.clone())
    } else {
        Api::namespaced(client.clone(), namespace)
    };
    let flow_list = flows.list(&ListParams::default()).await?;

    debug!("Discovered {} kantaloupeflow(s)", flow_list.items.len());
    Ok(flow_list.items)
}

pub async fn fetch_kantaloupeflow(client: &Client, namespace: &str, name: &str) -> Result<KantaloupeFlow> {
    let flows: Api<KantaloupeFlow> = Api::namespaced(client.clone(), namespace);
    let flow = flows.get(name).await?;

    debug!("Fetched kantaloupeflow: {}/{}", namespace, name);
    Ok(flow)
}

pub async fn create_kantaloupeflow(client: &Client, flow: &KantaloupeFlow) -> Result<KantaloupeFlow> {
    let namespace = flow.namespace().unwrap_or_default();
    let flows: Api<KantaloupeFlow> = Api::namespaced(client.clone(), &namespace);
    flows.create(&PostParams::default(), flow).await.map_err(|e| {
        error!(error = %e, "failed to create kantaloupeflow {}/{}", namespace, flow.name_any());
        e.into()
    })
}

pub async fn replace_kantaloupeflow(client: &Client, flow: &KantaloupeFlow) -> Result<KantaloupeFlow> {
    let namespace = flow.namespace().unwrap_or_default();
    let flows: Api<KantaloupeFlow> = Api::namespaced(client.clone(), &namespace);
    flows
        .replace(&flow.name_any(), &PostParams::default(), flow)
        .await
        .map_err(|e| {
            error!(error = %e, "update flow error {}/{}", namespace, flow.name_any());
            e.into()
        })
}

pub async fn delete_kantaloupeflow(client: &Client, namespace: &str, name: &str) -> Result<()> {
    let flows: Api<KantaloupeFlow> = Api::namespaced(client.clone(), namespace);
    flows.delete(name, &DeleteParams::default()).await?;

    debug!("Deleted kantaloupeflow: {}/{}", namespace, name);
    Ok(())
}
