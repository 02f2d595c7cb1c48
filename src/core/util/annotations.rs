//! HAMi device annotations carried by pods and nodes.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

pub const POD_GPU_MEMORY_ANNOTATION: &str = "hami.io/vgpu-devices-allocated";
pub const POD_NEURONS_ANNOTATION: &str = "hami.io/aws-neuron-devices-allocated";
pub const NODE_NVIDIA_GPU_ANNOTATION: &str = "hami.io/node-nvidia-register";
pub const NODE_REGISTER_PREFIX: &str = "hami.io/node-register-";
pub const MEMORY_SCALE_ANNOTATION: &str = "NVIDIA_GPU_MEMORY_FACTOR";
pub const DEVICES_ALLOCATED_SUFFIX: &str = "-devices-allocated";

/// One device slice handed to a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuAllocation {
    pub uuid: String,
    pub vendor: String,
    pub memory: i64,
    pub core: i32,
}

/// Parse `uuid,vendor,mem,core:uuid,vendor,mem,core:;`.
pub fn parse_gpu_allocations(annotation: &str) -> Result<Vec<GpuAllocation>> {
    let mut out = Vec::new();
    for entry in annotation.split(':') {
        let fields: Vec<&str> = entry.split(',').collect();
        if fields[0] == ";" {
            break;
        }
        if fields.len() != 4 {
            return Err(anyhow!("invalid format for annotation: {}", entry));
        }
        out.push(GpuAllocation {
            uuid: fields[0].to_string(),
            vendor: fields[1].to_string(),
            memory: fields[2].trim().parse()?,
            core: fields[3].trim().parse()?,
        });
    }
    Ok(out)
}

/// Memory oversubscription factor of a node; 1.0 when absent, unparsable or zero.
pub fn memory_factor(annotations: &BTreeMap<String, String>) -> f64 {
    annotations
        .get(MEMORY_SCALE_ANNOTATION)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|f| *f != 0.0)
        .unwrap_or(1.0)
}

/// vGPU types advertised in `hami.io/node-nvidia-register`; entries carry seven fields
/// and the fifth is the device type.
pub fn nvidia_register_types(annotation: &str) -> Vec<String> {
    annotation
        .split(':')
        .filter_map(|entry| {
            let fields: Vec<&str> = entry.split(',').collect();
            (fields.len() == 7).then(|| fields[4].to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allocations() {
        let raw = "GPU-a,NVIDIA,4096,30:GPU-b,NVIDIA,2048,50:;";
        let parsed = parse_gpu_allocations(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].uuid, "GPU-a");
        assert_eq!(parsed[1].memory, 2048);
        assert_eq!(parsed[1].core, 50);
    }

    #[test]
    fn test_parse_rejects_short_entry() {
        assert!(parse_gpu_allocations("GPU-a,NVIDIA,4096:;").is_err());
        assert!(parse_gpu_allocations("GPU-a,NVIDIA,x,1:;").is_err());
    }

    #[test]
    fn test_memory_factor() {
        let mut ann = BTreeMap::new();
        assert_eq!(memory_factor(&ann), 1.0);
        ann.insert(MEMORY_SCALE_ANNOTATION.to_string(), "2".to_string());
        assert_eq!(memory_factor(&ann), 2.0);
        ann.insert(MEMORY_SCALE_ANNOTATION.to_string(), "0".to_string());
        assert_eq!(memory_factor(&ann), 1.0);
        ann.insert(MEMORY_SCALE_ANNOTATION.to_string(), "abc".to_string());
        assert_eq!(memory_factor(&ann), 1.0);
    }

    #[test]
    fn test_register_types() {
        let raw = "GPU-1,10,24576,100,NVIDIA-A10,0,true:GPU-2,10,24576,100,NVIDIA-A10,0,true:";
        assert_eq!(nvidia_register_types(raw), vec!["NVIDIA-A10", "NVIDIA-A10"]);
        assert!(nvidia_register_types("").is_empty());
    }
}
