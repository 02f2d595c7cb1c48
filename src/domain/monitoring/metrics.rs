use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::core::client::prometheus_client::{Matrix, MetricsError, PromClient, Sample, Vector};
use crate::core::util::time_range::AlignedRange;
use crate::domain::monitoring::query::MetricQuery;

/// Typed access to the metrics endpoint shared by every view assembler.
#[derive(Clone)]
pub struct MetricsQuerier {
    client: Arc<dyn PromClient>,
}

impl MetricsQuerier {
    pub fn new(client: Arc<dyn PromClient>) -> Self {
        Self { client }
    }

    /// Raw instant query evaluated now.
    pub async fn query_vector(&self, query: &str) -> Result<Vector, MetricsError> {
        let vector = self.client.query(query, Utc::now()).await?;
        debug!(%query, samples = vector.len(), "instant query");
        Ok(vector)
    }

    pub async fn query_range(&self, query: &str, range: &AlignedRange) -> Result<Matrix, MetricsError> {
        self.client.query_range(query, range).await
    }

    /// Every sample matching `query`.
    pub async fn vector(&self, query: &MetricQuery) -> Result<Vector, MetricsError> {
        self.query_vector(&query.promql()).await
    }

    /// The single sample of a rollup; any other count is an error.
    pub async fn one(&self, query: &MetricQuery) -> Result<Sample, MetricsError> {
        let promql = query.promql();
        let vector = self.query_vector(&promql).await?;
        expect_one(&promql, vector)
    }

    /// Samples keyed by the value of `label`.
    pub async fn map_by(&self, query: &MetricQuery, label: &str) -> Result<HashMap<String, Sample>, MetricsError> {
        let vector = self.vector(query).await?;
        vector_to_map_by_label(vector, label)
    }

    /// The selector summed into one stream over `range`.
    pub async fn summed_range(&self, query: &MetricQuery, range: &AlignedRange) -> Result<Matrix, MetricsError> {
        self.query_range(&query.summed(), range).await
    }
}

/// Assert a vector holds exactly one sample.
pub fn expect_one(query: &str, mut vector: Vector) -> Result<Sample, MetricsError> {
    if vector.len() != 1 {
        return Err(MetricsError::UnexpectedSampleCount {
            query: query.to_string(),
            got: vector.len(),
        });
    }
    Ok(vector.remove(0))
}

/// Key samples by a label value. A sample without the label is an error; the last of
/// several samples sharing a value wins.
pub fn vector_to_map_by_label(vector: Vector, label: &str) -> Result<HashMap<String, Sample>, MetricsError> {
    let mut out = HashMap::with_capacity(vector.len());
    for sample in vector {
        let key = sample.label(label).to_string();
        if key.is_empty() {
            return Err(MetricsError::MissingLabel {
                label: label.to_string(),
                metric: sample.metric,
            });
        }
        out.insert(key, sample);
    }
    Ok(out)
}

/// Sum sample values per `label` and sort by the sum. Samples without the label are
/// skipped. Ties keep label order.
pub fn group_and_sort_vector(vector: &[Sample], label: &str, ascending: bool) -> Vec<(String, f64)> {
    let mut sums: HashMap<&str, f64> = HashMap::new();
    for sample in vector {
        let key = sample.label(label);
        if key.is_empty() {
            continue;
        }
        *sums.entry(key).or_insert(0.0) += sample.value;
    }

    let mut grouped: Vec<(String, f64)> = sums.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    grouped.sort_by(|a, b| a.0.cmp(&b.0));
    grouped.sort_by(|a, b| {
        let ord = a.1.total_cmp(&b.1);
        if ascending { ord } else { ord.reverse() }
    });
    grouped
}

/// Treat an unreachable or unconfigured metrics endpoint as "no data". Any other failure
/// (a malformed answer, a broken single-sample rollup) is returned to the caller.
pub fn best_effort<T: Default>(what: &str, result: Result<T, MetricsError>) -> Result<T, MetricsError> {
    match result {
        Err(e) if e.is_unavailable() => {
            warn!(error = %e, "{} skipped, metrics unavailable", what);
            Ok(T::default())
        }
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::core::client::prometheus_client::{
        Labels, Matrix, MetricsError, PromClient, Sample, Vector,
    };
    use crate::core::util::time_range::AlignedRange;

    /// Canned answers keyed by exact PromQL. Unknown queries return an empty result.
    #[derive(Default)]
    pub struct FakeProm {
        pub vectors: HashMap<String, Vector>,
        pub matrices: HashMap<String, Matrix>,
        pub unavailable: bool,
        pub seen: Mutex<Vec<String>>,
    }

    impl FakeProm {
        pub fn with_vector(mut self, query: impl Into<String>, vector: Vector) -> Self {
            self.vectors.insert(query.into(), vector);
            self
        }

        pub fn with_matrix(mut self, query: impl Into<String>, matrix: Matrix) -> Self {
            self.matrices.insert(query.into(), matrix);
            self
        }
    }

    #[async_trait]
    impl PromClient for FakeProm {
        async fn query(&self, query: &str, _at: DateTime<Utc>) -> Result<Vector, MetricsError> {
            self.seen.lock().unwrap().push(query.to_string());
            if self.unavailable {
                return Err(MetricsError::ClientUninitialized);
            }
            Ok(self.vectors.get(query).cloned().unwrap_or_default())
        }

        async fn query_range(&self, query: &str, _range: &AlignedRange) -> Result<Matrix, MetricsError> {
            self.seen.lock().unwrap().push(query.to_string());
            if self.unavailable {
                return Err(MetricsError::ClientUninitialized);
            }
            Ok(self.matrices.get(query).cloned().unwrap_or_default())
        }
    }

    pub fn sample(labels: &[(&str, &str)], value: f64) -> Sample {
        Sample {
            metric: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Labels>(),
            value,
            timestamp_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{sample, FakeProm};
    use super::*;
    use crate::domain::monitoring::query::QueryType;

    #[test]
    fn test_expect_one() {
        let ok = expect_one("q", vec![sample(&[], 3.0)]).unwrap();
        assert_eq!(ok.value, 3.0);

        let err = expect_one("kantaloupe_cluster_cpu_total", vec![]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "the query kantaloupe_cluster_cpu_total expects one element, got 0; please check the status of metrics service"
        );
    }

    #[test]
    fn test_vector_to_map_by_label() {
        let vec = vec![
            sample(&[("UUID", "a")], 1.0),
            sample(&[("UUID", "b")], 2.0),
            sample(&[("UUID", "a")], 3.0),
        ];
        let map = vector_to_map_by_label(vec, "UUID").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"].value, 3.0);

        let err = vector_to_map_by_label(vec![sample(&[], 1.0)], "UUID").unwrap_err();
        assert!(err.to_string().contains("label \"UUID\" not found"));
    }

    #[test]
    fn test_group_and_sort_vector() {
        let vec = vec![
            sample(&[("node", "n1")], 1.0),
            sample(&[("node", "n2")], 1.0),
            sample(&[("node", "n1")], 1.0),
            sample(&[], 5.0),
        ];
        assert_eq!(
            group_and_sort_vector(&vec, "node", false),
            vec![("n1".to_string(), 2.0), ("n2".to_string(), 1.0)]
        );
        assert_eq!(group_and_sort_vector(&vec, "node", true)[0].0, "n2");
    }

    #[test]
    fn test_best_effort_defaults_only_when_unavailable() {
        let v: Vector = best_effort("cluster metrics", Err(MetricsError::ClientUninitialized)).unwrap();
        assert!(v.is_empty());
        let v: Vector = best_effort("cluster metrics", Err(MetricsError::Timeout("5s".into()))).unwrap();
        assert!(v.is_empty());
        let v = best_effort("cluster metrics", Ok(vec![sample(&[], 1.0)])).unwrap();
        assert_eq!(v.len(), 1);

        let decode: Result<Vector, _> = best_effort("cluster metrics", Err(MetricsError::Decode("eof".into())));
        assert!(matches!(decode, Err(MetricsError::Decode(_))));
    }

    #[tokio::test]
    async fn test_best_effort_surfaces_wrong_sample_count() {
        let query = MetricQuery::cluster("alpha", QueryType::CpuTotal);
        let prom = FakeProm::default().with_vector(query.promql(), vec![sample(&[], 1.0), sample(&[], 2.0)]);
        let querier = MetricsQuerier::new(Arc::new(prom));

        let total = best_effort("cluster total", querier.one(&query).await.map(|s| s.value));
        assert!(matches!(total, Err(MetricsError::UnexpectedSampleCount { got: 2, .. })));
    }

    #[tokio::test]
    async fn test_one_runs_rollup_query() {
        let query = MetricQuery::cluster("alpha", QueryType::CpuTotal);
        let prom = FakeProm::default().with_vector(query.promql(), vec![sample(&[], 64.0)]);
        let querier = MetricsQuerier::new(Arc::new(prom));
        assert_eq!(querier.one(&query).await.unwrap().value, 64.0);

        let missing = MetricQuery::cluster("beta", QueryType::CpuTotal);
        assert!(matches!(
            querier.one(&missing).await,
            Err(MetricsError::UnexpectedSampleCount { got: 0, .. })
        ));
    }
}
