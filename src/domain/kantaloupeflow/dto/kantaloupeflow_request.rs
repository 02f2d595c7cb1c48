use serde::Deserialize;
use validator::Validate;

/// `?namespace=&name=&state=&sortBy=&sortDir=` on the flow list. `name` is a fuzzy keyword.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct KantaloupeflowFilter {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    /// `field_name` or `created_at`.
    #[serde(default)]
    pub sort_by: String,
    /// `asc` or `desc`.
    #[serde(default)]
    pub sort_dir: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGpuMemoryRequest {
    /// New per-pod GPU memory in MiB.
    #[serde(default)]
    pub gpumemory: i32,
}
