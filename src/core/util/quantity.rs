//! Minimal Kubernetes quantity arithmetic.

use anyhow::{anyhow, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Parse `10Gi`, `500m`, `1.5`, `2e3` into a float in base units.
pub fn parse_quantity(raw: &str) -> Result<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(anyhow!("empty quantity"));
    }
    let split = s
        .rfind(|c: char| !c.is_ascii_alphabetic())
        .map_or(0, |i| i + 1);
    let (number, suffix) = s.split_at(split);
    let multiplier = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        other => return Err(anyhow!("invalid quantity suffix {other:?} in {raw:?}")),
    };
    let value: f64 = number
        .parse()
        .map_err(|_| anyhow!("invalid quantity {raw:?}"))?;
    Ok(value * multiplier)
}

/// Integer value rounded up, as Kubernetes reports `Quantity.Value()`.
pub fn quantity_value(q: &Quantity) -> i64 {
    parse_quantity(&q.0).map(|v| v.ceil() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("4").unwrap(), 4.0);
        assert_eq!(parse_quantity("500m").unwrap(), 0.5);
        assert_eq!(parse_quantity("1Ki").unwrap(), 1024.0);
        assert_eq!(parse_quantity("10Gi").unwrap(), 10.0 * 1024.0 * 1024.0 * 1024.0);
        assert_eq!(parse_quantity("2k").unwrap(), 2000.0);
        assert_eq!(parse_quantity("1e3").unwrap(), 1000.0);
        assert_eq!(parse_quantity("2E").unwrap(), 2e18);
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("3Xi").is_err());
    }

    #[test]
    fn test_value_rounds_up() {
        assert_eq!(quantity_value(&Quantity("1500m".into())), 2);
        assert_eq!(quantity_value(&Quantity("bogus".into())), 0);
    }
}
