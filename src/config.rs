use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

use crate::core::client::cluster_client_manager::DEFAULT_CLIENT_TTL;
use crate::core::util::constants::DEFAULT_LIBCUDA_LOG_LEVEL;
use crate::core::util::fanout::DEFAULT_FANOUT_LIMIT;

pub const DEFAULT_PROMETHEUS_ADDR: &str = "http://prometheus-kube-prometheus-prometheus.monitoring.svc.cluster.local:9090";

/// Kantaloupe API server: multi-cluster GPU inventory, workloads and monitoring over REST.
#[derive(Debug, Clone, Parser)]
#[command(name = "kantaloupe-apiserver", about, version)]
pub struct Options {
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0", help = "Server bind address")]
    pub bind_address: String,

    #[arg(long, env = "INSECURE_PORT", default_value_t = 8000, help = "Plain HTTP port, 0 to disable")]
    pub insecure_port: u16,

    /// Accepted for compatibility; no gRPC listener is started.
    #[arg(long, env = "INSECURE_GRPC_PORT", default_value_t = 8001)]
    pub insecure_grpc_port: u16,

    #[arg(long, env = "SECURE_PORT", default_value_t = 0, help = "HTTPS port, 0 to disable")]
    pub secure_port: u16,

    #[arg(long, env = "TLS_CERT_FILE", value_hint = clap::ValueHint::FilePath)]
    pub tls_cert_file: Option<PathBuf>,

    #[arg(long, env = "TLS_PRIVATE_KEY", value_hint = clap::ValueHint::FilePath)]
    pub tls_private_key: Option<PathBuf>,

    #[arg(long, env = "PROMETHEUS_ADDR", default_value = DEFAULT_PROMETHEUS_ADDR, help = "Prometheus address")]
    pub prometheus_addr: String,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Kubeconfig of the control-plane cluster, in-cluster config when unset"
    )]
    pub kubeconfig: Option<String>,

    #[arg(long, env = "CLIENT_CACHE_TTL", default_value_t = DEFAULT_CLIENT_TTL.as_secs(), help = "Seconds a member-cluster client is reused")]
    pub client_cache_ttl: u64,

    #[arg(long, env = "FANOUT_CONCURRENCY", default_value_t = DEFAULT_FANOUT_LIMIT)]
    pub fanout_concurrency: usize,

    #[arg(long, env = "LIBCUDA_LOG_LEVEL", default_value = DEFAULT_LIBCUDA_LOG_LEVEL)]
    pub libcuda_log_level: String,

    #[arg(long, env = "SKIP_CHECK_CLUSTER_KUBESYSTEMID", help = "Allow clusters sharing a kube-system UID")]
    pub skip_check_cluster_kubesystem_id: bool,

    #[arg(long, help = "Debug logging")]
    pub debug: bool,

    #[arg(long, env = "LOG_DIR", help = "Also write daily-rolled logs to this directory")]
    pub log_dir: Option<PathBuf>,
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        if self.insecure_port == 0 && self.secure_port == 0 {
            bail!("insecure-port and secure-port can not both be 0");
        }
        if self.secure_port != 0 && (self.tls_cert_file.is_none() || self.tls_private_key.is_none()) {
            bail!("secure-port requires both tls-cert-file and tls-private-key");
        }
        if self.bind_address.parse::<IpAddr>().is_err() {
            bail!("invalid bind-address {}", self.bind_address);
        }
        if self.fanout_concurrency == 0 {
            bail!("fanout-concurrency must be positive");
        }
        Ok(())
    }

    pub fn client_ttl(&self) -> Duration {
        Duration::from_secs(self.client_cache_ttl)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.insecure_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Options {
        let mut argv = vec!["kantaloupe-apiserver"];
        argv.extend_from_slice(args);
        Options::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&["--kubeconfig", "/tmp/kc"]);
        assert_eq!(opts.insecure_port, 8000);
        assert_eq!(opts.insecure_grpc_port, 8001);
        assert_eq!(opts.secure_port, 0);
        assert_eq!(opts.client_ttl(), Duration::from_secs(60));
        assert_eq!(opts.listen_address(), "0.0.0.0:8000");
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_rejects_no_listener() {
        let opts = parse(&["--insecure-port", "0"]);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_secure_port_needs_tls_files() {
        let opts = parse(&["--secure-port", "8443", "--tls-cert-file", "/etc/tls.crt"]);
        assert!(opts.validate().unwrap_err().to_string().contains("tls-private-key"));

        let opts = parse(&[
            "--secure-port",
            "8443",
            "--tls-cert-file",
            "/etc/tls.crt",
            "--tls-private-key",
            "/etc/tls.key",
        ]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_bind_address() {
        let opts = parse(&["--bind-address", "localhost:80"]);
        assert!(opts.validate().is_err());
    }
}
