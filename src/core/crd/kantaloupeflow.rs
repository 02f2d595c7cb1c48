use k8s_openapi::api::core::v1::{PodTemplateSpec, VolumeMount};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

use super::Condition;

pub const CONDITION_AVAILABLE: &str = "Available";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Ssh,
    Vscode,
    Jupyter,
}

/// A deployment-like GPU workload with plugins and networking.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize)]
#[kube(
    group = "kantaloupe.dynamia.ai",
    version = "v1alpha1",
    kind = "KantaloupeFlow",
    plural = "kantaloupeflows",
    shortname = "klf",
    namespaced,
    status = "KantaloupeFlowStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct KantaloupeFlowSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub template: PodTemplateSpec,
    #[serde(default)]
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networking: Vec<Networking>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depend_on: Vec<DependOn>,
    #[serde(default)]
    pub workload: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    pub port: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependOn {
    pub kind: String,
    pub resource_ref: ResourceReference,
    pub effect: Effect,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ResourceReference {
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KantaloupeFlowStatus {
    pub replicas: i32,
    pub ready_replicas: i32,
    pub networking: Vec<Networking>,
    pub conditions: Vec<Condition>,
}

impl KantaloupeFlow {
    pub fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or(&[])
    }
}
