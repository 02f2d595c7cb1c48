//! Well-known names shared by the cluster, card, flow and quota views.

pub const SELECT_ALL: &str = "__ALL__";
pub const LOCAL_CLUSTER: &str = "local-cluster";
pub const DEFAULT_PROVIDER: &str = "GENERIC";
pub const DEFAULT_NAMESPACE: &str = "kantaloupe-system";
pub const SORT_BY_DESC: &str = "desc";

// ==================== Labels & annotations ====================

pub const PVC_TYPE_LABEL_KEY: &str = "kantaloupe.dynamia.ai/pvc-type";
pub const CLUSTER_ALIAS_ANNOTATION_KEY: &str = "kantaloupe.dynamia.ai/alias-name";
pub const CLUSTER_DESCRIPTION_ANNOTATION_KEY: &str = "kantaloupe.dynamia.ai/description";
pub const CLUSTER_NAME_LABEL_KEY: &str = "kantaloupe.dynamia.ai/name";
pub const MANAGED_BY_LABEL_KEY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_LABEL_VALUE: &str = "kantaloupe";
pub const CREDENTIAL_TYPE_LABEL_KEY: &str = "kantaloupe.io/credential-type";
pub const CREDENTIAL_TYPE_DOCKER_REGISTRY: &str = "docker-registry";
pub const STORAGE_TYPE_KEY: &str = "kantaloupe.io/storage-type";
pub const KANTALOUPEFLOW_APP_LABEL_KEY: &str = "katanloupeflow-name";
pub const POD_ALLOCATION_MEET_ANNOTATION: &str = "kantaloupe.dynamia.io/pod-allocation-meet";
pub const HAMI_SCHEDULER_COMPONENT_LABEL: &str = "app.kubernetes.io/component=hami-scheduler";

pub const CONTROL_PLANE_LABEL_KEY: &str = "node-role.kubernetes.io/control-plane";
pub const MASTER_LABEL_KEY: &str = "node-role.kubernetes.io/master";
pub const WORKER_LABEL_KEY: &str = "node-role.kubernetes.io/worker";

// ==================== Device resources ====================

pub const NVIDIA_GPU: &str = "nvidia.com/gpu";
pub const NVIDIA_GPU_CORES: &str = "nvidia.com/gpucores";
pub const NVIDIA_GPU_MEMORY: &str = "nvidia.com/gpumem";
pub const NVIDIA_QUOTA_GPU_MEMORY: &str = "requests.nvidia.com/gpumem";
pub const METAX_GPU: &str = "metax-tech.com/sgpu";
pub const METAX_VMEMORY: &str = "metax-tech.com/vmemory";
pub const METAX_VCORE: &str = "metax-tech.com/vcore";
pub const AWS_NEURON: &str = "aws.amazon.com/neuron";
pub const AWS_NEURON_CORE: &str = "aws.amazon.com/neuroncore";

pub const METAX_WORKLOAD_LIMIT: i32 = 16;

// ==================== Flow plugins ====================

pub const SSH_SERVICE_NAME: &str = "sshd";
pub const VSCODE_SERVICE_NAME: &str = "vscode";
pub const JUPYTER_SERVICE_NAME: &str = "jupyter";

pub const HTTP_PROTOCOL: &str = "http";
pub const TCP_PROTOCOL: &str = "tcp";
pub const NETWORK_HTTP_ROUTE: &str = "httproute";
pub const NETWORK_TCP_ROUTE: &str = "tcproute";

pub const DEFAULT_PORT_SSH: i32 = 22;
pub const DEFAULT_PORT_VSCODE: i32 = 6666;
pub const DEFAULT_PORT_JUPYTER: i32 = 5555;

pub const ENV_SSH_ROOT_PASSWORD: &str = "ROOT_PASSWORD";
pub const ENV_ENABLE_JUPYTER: &str = "ENABLE_JUPYTERLAB";
pub const ENV_ENABLE_VSCODE: &str = "ENABLE_CODE_SERVER";
pub const ENV_JUPYTER_TOKEN: &str = "JUPYTER_TOKEN";
pub const ENV_LIBCUDA_LOG_LEVEL: &str = "LIBCUDA_LOG_LEVEL";
pub const ENV_GPU_CORE_UTILIZATION_POLICY: &str = "GPU_CORE_UTILIZATION_POLICY";
pub const ENV_NEURON_PROCESS_TAG: &str = "NEURON_PROCESS_TAG";
pub const DEFAULT_LIBCUDA_LOG_LEVEL: &str = "2";

pub const HAMI_SCHEDULER_NAME: &str = "hami-scheduler";

pub const KIND_DEPLOYMENT: &str = "Deployment";
