//! Prometheus metrics.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread;

/// Default port of the Prometheus HTTP listener.
pub const DEFAULT_METRICS_PORT: u16 = 9464;

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Address to bind the metrics exporter.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_METRICS_PORT),
        }
    }
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: &MetricsSettings) -> Self {
        Self::from_sources(settings, |key| std::env::var(key).ok())
    }

    /// Resolves the configuration from settings and an environment lookup.
    ///
    /// `COMPOUND_METRICS_ENABLED` and `COMPOUND_METRICS_PORT` override the
    /// config file; unparseable values are ignored.
    pub fn from_sources(settings: &MetricsSettings, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("COMPOUND_METRICS_ENABLED")
            .map(|v| parse_bool(&v))
            .or(settings.enabled)
            .unwrap_or(false);
        let port = lookup("COMPOUND_METRICS_PORT")
            .and_then(|v| v.trim().parse::<u16>().ok())
            .or(settings.port)
            .unwrap_or(DEFAULT_METRICS_PORT);

        Self {
            enabled,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        }
    }
}

/// Installs the Prometheus recorder, with an HTTP listener when `expose` is
/// set.
///
/// Returns `None` when metrics are disabled.
pub fn install_prometheus(config: &MetricsConfig, expose: bool) -> Result<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let builder = PrometheusBuilder::new();
    let handle = if expose {
        install_listener(builder.with_http_listener(config.listen_addr))?
    } else {
        builder
            .install_recorder()
            .map_err(|e| Error::operation("metrics_recorder_install", e))?
    };
    tracing::debug!(addr = %config.listen_addr, expose, "Prometheus recorder installed");
    Ok(Some(handle))
}

fn install_listener(builder: PrometheusBuilder) -> Result<PrometheusHandle> {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        return install_with_runtime(builder, &handle);
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::operation("metrics_runtime_init", e))?;
    let handle = runtime.handle().clone();
    let prometheus = install_with_runtime(builder, &handle)?;
    thread::Builder::new()
        .name("compound-metrics-http".to_string())
        .spawn(move || runtime.block_on(std::future::pending::<()>()))
        .map_err(|e| Error::operation("metrics_runtime_thread", e))?;
    Ok(prometheus)
}

fn install_with_runtime(
    builder: PrometheusBuilder,
    runtime_handle: &tokio::runtime::Handle,
) -> Result<PrometheusHandle> {
    let (recorder, exporter) = {
        let _guard = runtime_handle.enter();
        builder
            .build()
            .map_err(|e| Error::operation("metrics_exporter_build", e))?
    };
    let handle = recorder.handle();
    set_global_recorder(recorder)?;
    runtime_handle.spawn(exporter);
    Ok(handle)
}

fn set_global_recorder(recorder: PrometheusRecorder) -> Result<()> {
    metrics::set_global_recorder(recorder).map_err(|e| Error::operation("metrics_recorder_install", e))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
