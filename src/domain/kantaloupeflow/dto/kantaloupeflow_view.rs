//! Console shape of a kantaloupeflow. Pod templates follow the Kubernetes field names
//! except for resource lists, which split out cpu/memory/storage.

use std::collections::BTreeMap;

use anyhow::Result;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements as KubeResourceRequirements,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};

use crate::core::client::kube_resources::ObjectMeta as KubeObjectMeta;
use crate::core::crd::kantaloupeflow::{
    KantaloupeFlow, KantaloupeFlowSpec, KantaloupeFlowStatus, PluginType, CONDITION_AVAILABLE,
};
use crate::core::crd::Condition;
use crate::core::util::filter::HasName;
use crate::core::util::quantity::parse_quantity;
use crate::domain::common::model::meta::{ConditionView, ObjectMeta};
use crate::errors::invalid_argument;

const CONDITION_PROGRESSING: &str = "Progressing";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KantaloupeflowState {
    #[default]
    #[serde(rename = "KANTALOUPEFLOW_STATE_UNSPECIFIED")]
    Unspecified,
    Progressing,
    Running,
    #[serde(alias = "Falied")]
    Failed,
}

impl KantaloupeflowState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Progressing" => Some(Self::Progressing),
            "Running" => Some(Self::Running),
            "Failed" | "Falied" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Running when `Available` is true; Progressing while `Progressing` is true or
    /// there is no verdict yet; Failed when `Available` is false.
    pub fn from_conditions(conditions: &[Condition]) -> Self {
        let find = |t: &str| conditions.iter().find(|c| c.type_ == t);
        let Some(available) = find(CONDITION_AVAILABLE) else {
            return Self::Progressing;
        };
        if available.status == "True" {
            return Self::Running;
        }
        if find(CONDITION_PROGRESSING).is_some_and(|p| p.status == "True") {
            return Self::Progressing;
        }
        if available.status == "False" {
            return Self::Failed;
        }
        Self::Progressing
    }
}

// ==================== Pod template ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceList {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cpu: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub memory: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub storage: String,
    /// Extended resources such as `nvidia.com/gpumem`.
    pub resources: BTreeMap<String, String>,
}

impl ResourceList {
    fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        [("cpu", &self.cpu), ("memory", &self.memory), ("storage", &self.storage)]
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k, v.as_str()))
            .chain(self.resources.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn to_kube(&self) -> Result<BTreeMap<String, Quantity>> {
        self.entries()
            .map(|(k, v)| {
                parse_quantity(v)
                    .map(|_| (k.to_string(), Quantity(v.to_string())))
                    .map_err(|e| invalid_argument(format!("invalid quantity {} for {}: {}", v, k, e)))
            })
            .collect()
    }

    pub fn from_kube(list: Option<&BTreeMap<String, Quantity>>) -> Self {
        let mut out = Self::default();
        for (k, v) in list.into_iter().flatten() {
            match k.as_str() {
                "cpu" => out.cpu = v.0.clone(),
                "memory" => out.memory = v.0.clone(),
                "storage" => out.storage = v.0.clone(),
                _ => {
                    out.resources.insert(k.clone(), v.0.clone());
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceRequirements {
    pub limits: ResourceList,
    pub requests: ResourceList,
}

impl ResourceRequirements {
    /// A limit without a matching request is also requested.
    pub fn to_kube(&self) -> Result<KubeResourceRequirements> {
        let limits = self.limits.to_kube()?;
        let mut requests = self.requests.to_kube()?;
        for (k, v) in &limits {
            requests.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Ok(KubeResourceRequirements {
            limits: Some(limits).filter(|l| !l.is_empty()),
            requests: Some(requests).filter(|r| !r.is_empty()),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub working_dir: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    pub env: Vec<EnvVar>,
    pub resources: ResourceRequirements,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_pull_policy: String,
}

fn non_empty<T>(v: Vec<T>) -> Option<Vec<T>> {
    Some(v).filter(|v| !v.is_empty())
}

fn non_blank(s: &str) -> Option<String> {
    Some(s.to_string()).filter(|s| !s.is_empty())
}

impl ContainerSpec {
    pub fn to_kube(&self) -> Result<Container> {
        Ok(Container {
            name: self.name.clone(),
            image: non_blank(&self.image),
            command: non_empty(self.command.clone()),
            args: non_empty(self.args.clone()),
            working_dir: non_blank(&self.working_dir),
            ports: non_empty(self.ports.clone()),
            env: non_empty(self.env.clone()),
            resources: Some(self.resources.to_kube()?),
            volume_mounts: non_empty(self.volume_mounts.clone()),
            image_pull_policy: non_blank(&self.image_pull_policy),
            ..Default::default()
        })
    }
}

/// Only name, image, env and resources are shown back.
impl From<&Container> for ContainerSpec {
    fn from(c: &Container) -> Self {
        let resources = c.resources.as_ref();
        Self {
            name: c.name.clone(),
            image: c.image.clone().unwrap_or_default(),
            env: c.env.clone().unwrap_or_default(),
            resources: ResourceRequirements {
                limits: ResourceList::from_kube(resources.and_then(|r| r.limits.as_ref())),
                requests: ResourceList::from_kube(resources.and_then(|r| r.requests.as_ref())),
            },
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpecView {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    pub containers: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodTemplateView {
    pub metadata: ObjectMeta,
    pub spec: PodSpecView,
}

impl PodTemplateView {
    pub fn to_kube(&self) -> Result<PodTemplateSpec> {
        let containers = self
            .spec
            .containers
            .iter()
            .map(ContainerSpec::to_kube)
            .collect::<Result<Vec<_>>>()?;
        Ok(PodTemplateSpec {
            metadata: Some(kube_meta(&self.metadata)),
            spec: Some(PodSpec {
                containers,
                volumes: non_empty(self.spec.volumes.clone()),
                ..Default::default()
            }),
        })
    }
}

fn kube_meta(meta: &ObjectMeta) -> KubeObjectMeta {
    KubeObjectMeta {
        name: non_blank(&meta.name),
        namespace: non_blank(&meta.namespace),
        labels: Some(meta.labels.clone()).filter(|l| !l.is_empty()),
        annotations: Some(meta.annotations.clone()).filter(|a| !a.is_empty()),
        ..Default::default()
    }
}

// ==================== Flow ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KantaloupeflowSpecView {
    pub plugins: Vec<PluginType>,
    pub replicas: i32,
    pub template: PodTemplateView,
    pub paused: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkView {
    pub name: String,
    pub url: String,
}

/// A device slice bound to the flow's pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuView {
    pub uuid: String,
    pub model: String,
    pub memory: i64,
    pub core: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KantaloupeflowStatusView {
    pub replicas: i32,
    pub ready_replicas: i32,
    pub networks: Vec<NetworkView>,
    pub state: KantaloupeflowState,
    pub conditions: Vec<ConditionView>,
    pub gpus: Vec<GpuView>,
}

impl From<&KantaloupeFlowStatus> for KantaloupeflowStatusView {
    fn from(status: &KantaloupeFlowStatus) -> Self {
        Self {
            replicas: status.replicas,
            ready_replicas: status.ready_replicas,
            networks: status
                .networking
                .iter()
                .map(|n| NetworkView {
                    name: n.name.clone(),
                    url: n.url.clone(),
                })
                .collect(),
            state: KantaloupeflowState::from_conditions(&status.conditions),
            conditions: status.conditions.iter().map(ConditionView::from).collect(),
            gpus: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KantaloupeflowView {
    pub metadata: ObjectMeta,
    pub spec: KantaloupeflowSpecView,
    pub status: KantaloupeflowStatusView,
}

impl KantaloupeflowView {
    /// The custom object to create; workload kind and networking are filled in later.
    pub fn to_flow(&self) -> Result<KantaloupeFlow> {
        let spec = KantaloupeFlowSpec {
            plugins: self.spec.plugins.clone(),
            replicas: Some(self.spec.replicas),
            template: self.spec.template.to_kube()?,
            paused: self.spec.paused,
            ..Default::default()
        };
        let mut flow = KantaloupeFlow::new(&self.metadata.name, spec);
        flow.metadata = kube_meta(&self.metadata);
        Ok(flow)
    }
}

impl From<&KantaloupeFlow> for KantaloupeflowView {
    fn from(flow: &KantaloupeFlow) -> Self {
        let template = &flow.spec.template;
        let containers = template
            .spec
            .as_ref()
            .map(|s| s.containers.iter().map(ContainerSpec::from).collect())
            .unwrap_or_default();
        Self {
            metadata: ObjectMeta::from(&flow.metadata),
            spec: KantaloupeflowSpecView {
                plugins: flow.spec.plugins.clone(),
                replicas: flow.spec.replicas.unwrap_or_default(),
                template: PodTemplateView {
                    metadata: template.metadata.as_ref().map(ObjectMeta::from).unwrap_or_default(),
                    spec: PodSpecView {
                        volumes: Vec::new(),
                        containers,
                    },
                },
                paused: flow.spec.paused,
            },
            status: flow
                .status
                .as_ref()
                .map(KantaloupeflowStatusView::from)
                .unwrap_or_else(|| KantaloupeflowStatusView {
                    state: KantaloupeflowState::Progressing,
                    ..Default::default()
                }),
        }
    }
}

impl HasName for KantaloupeflowView {
    fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Single flow with the node its pod landed on.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KantaloupeflowDetail {
    pub kantaloupeflow: KantaloupeflowView,
    pub node: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionStrings {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KantaloupeflowConditions {
    pub conditions: Vec<ConditionStrings>,
}

/// Cluster -> node -> number of flow pods.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KantaloupeTreeNode {
    pub name: String,
    pub value: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<KantaloupeTreeNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KantaloupeTree {
    pub data: Vec<KantaloupeTreeNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(type_: &str, status: &str) -> Condition {
        Condition {
            type_: type_.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_state_from_conditions() {
        use KantaloupeflowState::*;
        assert_eq!(KantaloupeflowState::from_conditions(&[]), Progressing);
        assert_eq!(KantaloupeflowState::from_conditions(&[condition("Available", "True")]), Running);
        assert_eq!(
            KantaloupeflowState::from_conditions(&[condition("Available", "False"), condition("Progressing", "True")]),
            Progressing
        );
        assert_eq!(KantaloupeflowState::from_conditions(&[condition("Available", "False")]), Failed);
        assert_eq!(KantaloupeflowState::from_conditions(&[condition("Available", "Unknown")]), Progressing);
    }

    #[test]
    fn test_limits_copied_into_requests() {
        let reqs = ResourceRequirements {
            limits: ResourceList {
                cpu: "2".into(),
                resources: BTreeMap::from([("nvidia.com/gpumem".to_string(), "4096".to_string())]),
                ..Default::default()
            },
            requests: ResourceList {
                cpu: "500m".into(),
                ..Default::default()
            },
        };
        let kube = reqs.to_kube().unwrap();
        let requests = kube.requests.unwrap();
        assert_eq!(requests["cpu"].0, "500m");
        assert_eq!(requests["nvidia.com/gpumem"].0, "4096");
        assert_eq!(kube.limits.unwrap().len(), 2);
    }

    #[test]
    fn test_bad_quantity_rejected() {
        let list = ResourceList {
            memory: "lots".into(),
            ..Default::default()
        };
        assert!(list.to_kube().is_err());
    }

    #[test]
    fn test_flow_from_request_json() {
        let view: KantaloupeflowView = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "notebook", "namespace": "team-a"},
            "spec": {
                "plugins": ["ssh", "jupyter"],
                "replicas": 1,
                "template": {"spec": {"containers": [{
                    "name": "main",
                    "image": "pytorch:2.3",
                    "resources": {"limits": {"resources": {"nvidia.com/gpu": "1"}}}
                }]}}
            }
        }))
        .unwrap();
        let flow = view.to_flow().unwrap();
        assert_eq!(flow.metadata.namespace.as_deref(), Some("team-a"));
        assert_eq!(flow.spec.plugins, vec![PluginType::Ssh, PluginType::Jupyter]);
        let container = &flow.spec.template.spec.as_ref().unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("pytorch:2.3"));

        let back = KantaloupeflowView::from(&flow);
        assert_eq!(back.spec.template.spec.containers[0].resources.requests.resources["nvidia.com/gpu"], "1");
        assert_eq!(back.status.state, KantaloupeflowState::Progressing);
    }
}
