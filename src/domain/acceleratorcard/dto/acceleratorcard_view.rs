use serde::Serialize;

use crate::core::client::prometheus_client::Sample;
use crate::domain::node::dto::node_view::NodeAddress;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AcceleratorCardState {
    #[default]
    #[serde(rename = "ACCELERATORCARD_STATE_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "HEALTH")]
    Health,
    #[serde(rename = "ERROR")]
    Error,
}

impl AcceleratorCardState {
    pub fn as_str(self) -> &'static str {
        match self {
            AcceleratorCardState::Unspecified => "ACCELERATORCARD_STATE_UNSPECIFIED",
            AcceleratorCardState::Health => "HEALTH",
            AcceleratorCardState::Error => "ERROR",
        }
    }
}

/// One accelerator as reported by the exporter. Memory figures are in MiB.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorCard {
    pub uuid: String,
    pub node: String,
    pub model: String,
    pub state: AcceleratorCardState,
    pub temperature: f64,
    pub power: f64,
    pub provider: String,
    #[serde(rename = "type")]
    pub cluster_type: String,
    pub node_addresses: Vec<NodeAddress>,
    pub gpu_core_total: i32,
    pub gpu_core_allocated: i32,
    pub gpu_core_usage: i32,
    pub gpu_memory_total: i64,
    pub gpu_memory_allocated: i64,
    pub gpu_memory_allocatable: i64,
    pub gpu_memory_usage: i64,
    pub workload_limit: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelNames {
    pub model_names: Vec<String>,
}

/// Samples of every card family belonging to one card.
#[derive(Debug, Clone, Default)]
pub struct CardSamples {
    pub temperature: Vec<Sample>,
    pub power: Vec<Sample>,
    pub errors: Vec<Sample>,
    pub memory_allocatable: Vec<Sample>,
    pub memory_used: Vec<Sample>,
    pub memory_allocated: Vec<Sample>,
    pub core_total: Vec<Sample>,
    pub core_used: Vec<Sample>,
    pub core_allocated: Vec<Sample>,
}

fn first(samples: &[Sample]) -> Option<f64> {
    samples.first().map(|s| s.value)
}

impl From<&CardSamples> for AcceleratorCard {
    /// Identity comes from the first temperature sample; a card with any reported error
    /// is in the error state.
    fn from(s: &CardSamples) -> Self {
        let mut card = AcceleratorCard::default();
        if let Some(t) = s.temperature.first() {
            card.uuid = t.label("UUID").to_string();
            card.model = t.label("modelName").to_string();
            card.node = t.label("node").to_string();
            // -1 means the exporter could not read the sensor
            card.temperature = if t.value == -1.0 { 0.0 } else { t.value };
            card.state = AcceleratorCardState::Health;
        }
        if let Some(p) = first(&s.power) {
            card.power = p;
        }
        if first(&s.errors).is_some_and(|e| e as i64 > 0) {
            card.state = AcceleratorCardState::Error;
        }
        card.gpu_memory_allocatable = first(&s.memory_allocatable).unwrap_or(0.0) as i64;
        card.gpu_memory_usage = first(&s.memory_used).unwrap_or(0.0) as i64;
        card.gpu_memory_allocated = first(&s.memory_allocated).unwrap_or(0.0) as i64;
        card.gpu_core_total = first(&s.core_total).unwrap_or(0.0) as i32;
        card.gpu_core_usage = first(&s.core_used).unwrap_or(0.0) as i32;
        card.gpu_core_allocated = first(&s.core_allocated).unwrap_or(0.0) as i32;
        card
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::monitoring::metrics::testing::sample;

    #[test]
    fn test_card_from_samples() {
        let samples = CardSamples {
            temperature: vec![sample(&[("UUID", "GPU-1"), ("modelName", "H100"), ("node", "n1")], -1.0)],
            power: vec![sample(&[], 250.5)],
            memory_allocatable: vec![sample(&[], 81920.0)],
            core_used: vec![sample(&[], 42.7)],
            ..Default::default()
        };
        let card = AcceleratorCard::from(&samples);
        assert_eq!(card.uuid, "GPU-1");
        assert_eq!(card.node, "n1");
        assert_eq!(card.temperature, 0.0);
        assert_eq!(card.state, AcceleratorCardState::Health);
        assert_eq!(card.gpu_memory_allocatable, 81920);
        assert_eq!(card.gpu_core_usage, 42);
        assert_eq!(card.gpu_memory_usage, 0);
    }

    #[test]
    fn test_errors_mark_card() {
        let samples = CardSamples {
            temperature: vec![sample(&[("UUID", "GPU-1")], 40.0)],
            errors: vec![sample(&[], 2.0)],
            ..Default::default()
        };
        assert_eq!(AcceleratorCard::from(&samples).state, AcceleratorCardState::Error);
    }
}
