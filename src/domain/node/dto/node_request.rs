use serde::Deserialize;
use validator::Validate;

/// `?name=&role=&phase=` on the node list. Empty or `*_UNSPECIFIED` values do not filter.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NodeFilter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub phase: String,
}
