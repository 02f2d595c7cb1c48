use serde::Deserialize;
use validator::Validate;

/// `?uuid=&model=&node=&state=` on the card list. `uuid` is a fuzzy pattern; `__ALL__`
/// for node or model means no filter.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorCardFilter {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub state: String,
}
