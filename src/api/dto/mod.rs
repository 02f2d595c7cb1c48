//! Query parameters that only exist at the HTTP surface.

use serde::Deserialize;
use validator::Validate;

/// `?namespace=` on lists that span namespaces; empty means all of them.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceQuery {
    #[serde(default)]
    pub namespace: String,
}

/// `?node=` narrowing a card lookup.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NodeQuery {
    #[serde(default)]
    pub node: String,
}
