use std::sync::Arc;

use crate::domain::context::ServiceContext;

/// Forward each method to a domain function taking the shared context first.
macro_rules! delegate_ctx_service {
    ($(fn $name:ident($($arg:ident : $typ:ty),*) -> $ret:ty => $path:path;)+) => {
        $(
            pub async fn $name(&self, $($arg: $typ),*) -> anyhow::Result<$ret> {
                $path(&self.ctx, $($arg),*).await
            }
        )+
    };
}

macro_rules! ctx_service {
    ($($service:ident),+ $(,)?) => {
        $(
            #[derive(Clone)]
            pub struct $service {
                ctx: Arc<ServiceContext>,
            }

            impl $service {
                pub fn new(ctx: Arc<ServiceContext>) -> Self {
                    Self { ctx }
                }
            }
        )+
    };
}

ctx_service!(
    ClusterService,
    NodeService,
    AcceleratorCardService,
    MonitoringService,
    ResourceService,
    StorageService,
    QuotaService,
    CredentialService,
    KantaloupeflowService,
);

#[derive(Clone)]
pub struct AppState {
    pub cluster_service: Arc<ClusterService>,
    pub node_service: Arc<NodeService>,
    pub accelerator_card_service: Arc<AcceleratorCardService>,
    pub monitoring_service: Arc<MonitoringService>,
    pub resource_service: Arc<ResourceService>,
    pub storage_service: Arc<StorageService>,
    pub quota_service: Arc<QuotaService>,
    pub credential_service: Arc<CredentialService>,
    pub kantaloupeflow_service: Arc<KantaloupeflowService>,
}

pub fn build_app_state(ctx: Arc<ServiceContext>) -> AppState {
    AppState {
        cluster_service: Arc::new(ClusterService::new(ctx.clone())),
        node_service: Arc::new(NodeService::new(ctx.clone())),
        accelerator_card_service: Arc::new(AcceleratorCardService::new(ctx.clone())),
        monitoring_service: Arc::new(MonitoringService::new(ctx.clone())),
        resource_service: Arc::new(ResourceService::new(ctx.clone())),
        storage_service: Arc::new(StorageService::new(ctx.clone())),
        quota_service: Arc::new(QuotaService::new(ctx.clone())),
        credential_service: Arc::new(CredentialService::new(ctx.clone())),
        kantaloupeflow_service: Arc::new(KantaloupeflowService::new(ctx)),
    }
}

impl ClusterService {
    delegate_ctx_service! {
        fn list_clusters(filter: &crate::domain::cluster::dto::cluster_request::ClusterFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::cluster::dto::cluster_view::ClusterView> => crate::domain::cluster::service::cluster_service::list_clusters;
        fn get_cluster(name: &str) -> crate::domain::cluster::dto::cluster_view::ClusterView => crate::domain::cluster::service::cluster_service::get_cluster;
        fn integrate_cluster(req: crate::domain::cluster::dto::cluster_request::IntegrateClusterRequest) -> crate::domain::cluster::dto::cluster_view::ClusterView => crate::domain::cluster::service::cluster_service::integrate_cluster;
        fn update_cluster(name: &str, req: crate::domain::cluster::dto::cluster_request::UpdateClusterRequest) -> () => crate::domain::cluster::service::cluster_service::update_cluster;
        fn delete_cluster(name: &str) -> () => crate::domain::cluster::service::cluster_service::delete_cluster;
        fn list_cluster_versions() -> crate::domain::cluster::dto::cluster_view::ClusterVersions => crate::domain::cluster::service::cluster_service::list_cluster_versions;
        fn get_cluster_plugins(name: &str) -> crate::domain::cluster::dto::cluster_view::ClusterPlugins => crate::domain::cluster::service::cluster_service::get_cluster_plugins;
        fn get_cluster_card_request_types(name: &str) -> crate::domain::cluster::dto::cluster_view::CardRequestTypes => crate::domain::cluster::service::cluster_service::get_cluster_card_request_types;
        fn get_platform_summary(query: &crate::domain::cluster::dto::cluster_request::PlatformSummaryQuery) -> crate::domain::cluster::dto::cluster_view::PlatformSummary => crate::domain::cluster::service::platform_service::get_platform_summary;
        fn get_gpu_top(query: &crate::domain::cluster::dto::cluster_request::GpuTopQuery) -> crate::domain::cluster::dto::cluster_view::GpuTop => crate::domain::cluster::service::platform_service::get_gpu_top;
    }

    pub async fn validate_kubeconfig(&self, kubeconfig: &str) -> anyhow::Result<crate::domain::cluster::dto::cluster_view::Validation> {
        crate::domain::cluster::service::cluster_service::validate_kubeconfig(kubeconfig).await
    }

    pub async fn validate_prometheus_address(&self, address: &str) -> anyhow::Result<crate::domain::cluster::dto::cluster_view::Validation> {
        crate::domain::cluster::service::cluster_service::validate_prometheus_address(address).await
    }
}

impl NodeService {
    delegate_ctx_service! {
        fn list_nodes(cluster: &str, filter: &crate::domain::node::dto::node_request::NodeFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::node::dto::node_view::NodeView> => crate::domain::node::service::node_service::list_nodes;
        fn get_node(cluster: &str, name: &str) -> crate::domain::node::dto::node_view::NodeView => crate::domain::node::service::node_service::get_node;
        fn list_cluster_gpu_summary(cluster: &str) -> crate::domain::node::dto::node_view::ClusterGpuSummary => crate::domain::node::service::node_service::list_cluster_gpu_summary;
    }
}

impl AcceleratorCardService {
    delegate_ctx_service! {
        fn list_accelerator_cards(cluster: &str, filter: &crate::domain::acceleratorcard::dto::acceleratorcard_request::AcceleratorCardFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::acceleratorcard::dto::acceleratorcard_view::AcceleratorCard> => crate::domain::acceleratorcard::service::acceleratorcard_service::list_accelerator_cards;
        fn get_accelerator_card(cluster: &str, node: &str, uuid: &str) -> crate::domain::acceleratorcard::dto::acceleratorcard_view::AcceleratorCard => crate::domain::acceleratorcard::service::acceleratorcard_service::get_accelerator_card;
        fn list_model_names(cluster: &str) -> crate::domain::acceleratorcard::dto::acceleratorcard_view::ModelNames => crate::domain::acceleratorcard::service::acceleratorcard_service::list_model_names;
    }
}

impl MonitoringService {
    delegate_ctx_service! {
        fn get_resource_trend(scope: crate::domain::monitoring::service::monitoring_service::TrendScope, req: crate::domain::monitoring::dto::monitoring_request::TrendQuery) -> crate::domain::monitoring::series::ResourceTrend => crate::domain::monitoring::service::monitoring_service::get_resource_trend;
        fn get_gpu_trend(cluster: &str, uuid: &str, req: crate::domain::monitoring::dto::monitoring_request::TrendQuery) -> crate::domain::monitoring::series::ResourceTrend => crate::domain::monitoring::service::monitoring_service::get_gpu_trend;
        fn get_kantaloupeflow_trend(cluster: &str, namespace: &str, name: &str, req: crate::domain::monitoring::dto::monitoring_request::TrendQuery) -> crate::domain::monitoring::series::ResourceTrend => crate::domain::monitoring::service::monitoring_service::get_kantaloupeflow_trend;
        fn get_node_workload_distribution(cluster: &str, node: &str) -> crate::domain::monitoring::service::monitoring_service::Distribution => crate::domain::monitoring::service::monitoring_service::get_node_workload_distribution;
        fn get_cluster_workload_distribution(cluster: &str) -> crate::domain::monitoring::service::monitoring_service::Distribution => crate::domain::monitoring::service::monitoring_service::get_cluster_workload_distribution;
        fn get_kantaloupeflow_memory_distribution(cluster: &str, namespace: &str, name: &str) -> crate::domain::monitoring::service::monitoring_service::MemoryDistribution => crate::domain::monitoring::service::monitoring_service::get_kantaloupeflow_memory_distribution;
        fn get_top_nodes(cluster: &str, req: crate::domain::monitoring::dto::monitoring_request::TopNodesQuery) -> crate::domain::monitoring::service::monitoring_service::Distribution => crate::domain::monitoring::service::monitoring_service::get_top_nodes;
        fn get_top_node_workloads(cluster: &str, req: crate::domain::monitoring::dto::monitoring_request::LimitQuery) -> crate::domain::monitoring::service::monitoring_service::Distribution => crate::domain::monitoring::service::monitoring_service::get_top_node_workloads;
        fn get_card_top_workloads(cluster: &str, uuid: &str, req: crate::domain::monitoring::dto::monitoring_request::CardTopWorkloadsQuery) -> crate::domain::monitoring::service::monitoring_service::CardTopWorkloads => crate::domain::monitoring::service::monitoring_service::get_card_top_workloads;
        fn get_cluster_workloads_top(cluster: &str, req: crate::domain::monitoring::dto::monitoring_request::WorkloadsTopQuery) -> crate::domain::monitoring::service::monitoring_service::WorkloadsTop => crate::domain::monitoring::service::monitoring_service::get_cluster_workloads_top;
    }
}

impl ResourceService {
    delegate_ctx_service! {
        fn list_configmaps(cluster: &str, namespace: &str, filter: &crate::domain::resource::dto::resource_request::NameFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::resource::dto::resource_view::ConfigMapView> => crate::domain::resource::service::resource_service::list_configmaps;
        fn get_configmap(cluster: &str, namespace: &str, name: &str) -> crate::domain::resource::dto::resource_view::ConfigMapView => crate::domain::resource::service::resource_service::get_configmap;
        fn get_configmap_json(cluster: &str, namespace: &str, name: &str) -> crate::core::client::kube_resources::ConfigMap => crate::domain::resource::service::resource_service::get_configmap_json;
        fn create_configmap(cluster: &str, namespace: &str, configmap: crate::core::client::kube_resources::ConfigMap) -> crate::domain::resource::dto::resource_view::ConfigMapView => crate::domain::resource::service::resource_service::create_configmap;
        fn update_configmap(cluster: &str, namespace: &str, name: &str, configmap: crate::core::client::kube_resources::ConfigMap) -> crate::core::client::kube_resources::ConfigMap => crate::domain::resource::service::resource_service::update_configmap;
        fn delete_configmap(cluster: &str, namespace: &str, name: &str) -> () => crate::domain::resource::service::resource_service::delete_configmap;
        fn list_secrets(cluster: &str, namespace: &str, filter: &crate::domain::resource::dto::resource_request::NameFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::resource::dto::resource_view::SecretView> => crate::domain::resource::service::resource_service::list_secrets;
        fn get_secret(cluster: &str, namespace: &str, name: &str) -> crate::domain::resource::dto::resource_view::SecretView => crate::domain::resource::service::resource_service::get_secret;
        fn create_secret(cluster: &str, namespace: &str, req: &crate::domain::resource::dto::resource_request::SecretRequest) -> crate::domain::resource::dto::resource_view::SecretView => crate::domain::resource::service::resource_service::create_secret;
        fn update_secret(cluster: &str, namespace: &str, name: &str, req: &crate::domain::resource::dto::resource_request::SecretRequest) -> crate::domain::resource::dto::resource_view::SecretView => crate::domain::resource::service::resource_service::update_secret;
        fn delete_secret(cluster: &str, namespace: &str, name: &str) -> () => crate::domain::resource::service::resource_service::delete_secret;
        fn list_persistent_volumes(cluster: &str, filter: &crate::domain::resource::dto::resource_request::NameFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::resource::dto::volume_view::PersistentVolumeView> => crate::domain::resource::service::resource_service::list_persistent_volumes;
        fn get_persistent_volume(cluster: &str, name: &str) -> crate::domain::resource::dto::volume_view::PersistentVolumeView => crate::domain::resource::service::resource_service::get_persistent_volume;
        fn delete_persistent_volume(cluster: &str, name: &str) -> () => crate::domain::resource::service::resource_service::delete_persistent_volume;
        fn list_persistent_volume_claims(cluster: &str, namespace: &str, filter: &crate::domain::resource::dto::resource_request::NameFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::resource::dto::volume_view::PersistentVolumeClaimView> => crate::domain::resource::service::resource_service::list_persistent_volume_claims;
        fn get_persistent_volume_claim(cluster: &str, namespace: &str, name: &str) -> crate::domain::resource::dto::volume_view::PersistentVolumeClaimView => crate::domain::resource::service::resource_service::get_persistent_volume_claim;
        fn delete_persistent_volume_claim(cluster: &str, namespace: &str, name: &str) -> () => crate::domain::resource::service::resource_service::delete_persistent_volume_claim;
        fn get_storage_class(cluster: &str, name: &str) -> crate::domain::resource::dto::volume_view::StorageClassView => crate::domain::resource::service::resource_service::get_storage_class;
        fn delete_storage_class(cluster: &str, name: &str) -> () => crate::domain::resource::service::resource_service::delete_storage_class;
        fn list_namespaces(cluster: &str, filter: &crate::domain::resource::dto::resource_request::NamespaceFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::resource::dto::resource_view::NamespaceView> => crate::domain::resource::service::resource_service::list_namespaces;
        fn list_events(cluster: &str, namespace: &str, filter: &crate::domain::resource::dto::resource_request::EventFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::resource::dto::resource_view::EventView> => crate::domain::resource::service::resource_service::list_events;
    }
}

impl StorageService {
    delegate_ctx_service! {
        fn create_storage(cluster: &str, req: &crate::domain::storage::dto::storage_request::CreateStorageRequest) -> crate::domain::storage::dto::storage_request::StorageView => crate::domain::storage::service::storage_service::create_storage;
        fn delete_storage(cluster: &str, namespace: &str, name: &str) -> () => crate::domain::storage::service::storage_service::delete_storage;
        fn list_storages(cluster: &str, filter: &crate::domain::storage::dto::storage_request::StorageFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::resource::dto::volume_view::PersistentVolumeClaimView> => crate::domain::storage::service::storage_service::list_storages;
        fn list_storage_classes(cluster: &str, filter: &crate::domain::resource::dto::resource_request::NameFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::resource::dto::volume_view::StorageClassView> => crate::domain::storage::service::storage_service::list_storage_classes;
    }
}

impl QuotaService {
    delegate_ctx_service! {
        fn list_quotas(cluster: &str, filter: &crate::domain::quota::dto::quota_dto::QuotaFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::quota::dto::quota_dto::QuotaView> => crate::domain::quota::service::quota_service::list_quotas;
        fn get_quota(cluster: &str, namespace: &str, name: &str) -> crate::domain::quota::dto::quota_dto::QuotaView => crate::domain::quota::service::quota_service::get_quota;
        fn create_quota(cluster: &str, req: &crate::domain::quota::dto::quota_dto::QuotaRequest) -> crate::domain::quota::dto::quota_dto::QuotaView => crate::domain::quota::service::quota_service::create_quota;
        fn update_quota(cluster: &str, req: &crate::domain::quota::dto::quota_dto::QuotaRequest) -> crate::domain::quota::dto::quota_dto::QuotaView => crate::domain::quota::service::quota_service::update_quota;
        fn delete_quota(cluster: &str, namespace: &str, name: &str) -> () => crate::domain::quota::service::quota_service::delete_quota;
    }
}

impl CredentialService {
    delegate_ctx_service! {
        fn list_credentials(filter: &crate::domain::credential::dto::credential_dto::CredentialFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::credential::dto::credential_dto::CredentialView> => crate::domain::credential::service::credential_service::list_credentials;
        fn get_credential(namespace: &str, name: &str) -> crate::domain::credential::dto::credential_dto::CredentialView => crate::domain::credential::service::credential_service::get_credential;
        fn create_credential(req: &crate::domain::credential::dto::credential_dto::CredentialRequest) -> crate::domain::credential::dto::credential_dto::CredentialView => crate::domain::credential::service::credential_service::create_credential;
        fn update_credential(name: &str, req: &crate::domain::credential::dto::credential_dto::CredentialRequest) -> crate::domain::credential::dto::credential_dto::CredentialView => crate::domain::credential::service::credential_service::update_credential;
        fn delete_credential(namespace: &str, name: &str) -> () => crate::domain::credential::service::credential_service::delete_credential;
    }
}

impl KantaloupeflowService {
    delegate_ctx_service! {
        fn create_kantaloupeflow(cluster: &str, view: &crate::domain::kantaloupeflow::dto::kantaloupeflow_view::KantaloupeflowView) -> crate::domain::kantaloupeflow::dto::kantaloupeflow_view::KantaloupeflowView => crate::domain::kantaloupeflow::service::kantaloupeflow_service::create_kantaloupeflow;
        fn get_kantaloupeflow(cluster: &str, namespace: &str, name: &str) -> crate::domain::kantaloupeflow::dto::kantaloupeflow_view::KantaloupeflowDetail => crate::domain::kantaloupeflow::service::kantaloupeflow_service::get_kantaloupeflow;
        fn list_kantaloupeflows(cluster: &str, filter: &crate::domain::kantaloupeflow::dto::kantaloupeflow_request::KantaloupeflowFilter, opts: &crate::domain::common::model::list::ListOptions) -> crate::domain::common::model::list::ListResponse<crate::domain::kantaloupeflow::dto::kantaloupeflow_view::KantaloupeflowView> => crate::domain::kantaloupeflow::service::kantaloupeflow_service::list_kantaloupeflows;
        fn delete_kantaloupeflow(cluster: &str, namespace: &str, name: &str) -> () => crate::domain::kantaloupeflow::service::kantaloupeflow_service::delete_kantaloupeflow;
        fn get_kantaloupe_tree() -> crate::domain::kantaloupeflow::dto::kantaloupeflow_view::KantaloupeTree => crate::domain::kantaloupeflow::service::kantaloupeflow_service::get_kantaloupe_tree;
        fn update_kantaloupeflow_gpu_memory(cluster: &str, namespace: &str, name: &str, req: &crate::domain::kantaloupeflow::dto::kantaloupeflow_request::UpdateGpuMemoryRequest) -> () => crate::domain::kantaloupeflow::service::kantaloupeflow_service::update_kantaloupeflow_gpu_memory;
        fn get_kantaloupeflow_conditions(cluster: &str, namespace: &str, name: &str) -> crate::domain::kantaloupeflow::dto::kantaloupeflow_view::KantaloupeflowConditions => crate::domain::kantaloupeflow::service::kantaloupeflow_service::get_kantaloupeflow_conditions;
    }
}
