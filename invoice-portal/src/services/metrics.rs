use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Workflow counters, exported next to the HTTP metrics recorded by the
/// shared middleware.
pub struct PortalMetrics {
    registry: Registry,
    transitions: IntCounterVec,
    uploads: IntCounterVec,
    exports: IntCounterVec,
}

static METRICS: OnceLock<Option<PortalMetrics>> = OnceLock::new();
static RECORDER: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

impl PortalMetrics {
    fn build() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let transitions = IntCounterVec::new(
            Opts::new(
                "invoice_transitions_total",
                "Lifecycle actions requested through the portal",
            ),
            &["action", "outcome"],
        )?;
        let uploads = IntCounterVec::new(
            Opts::new("pdf_uploads_total", "PDF files handled by the uploader"),
            &["field", "outcome"],
        )?;
        let exports = IntCounterVec::new(
            Opts::new("exports_total", "Spreadsheet and CSV exports produced"),
            &["kind"],
        )?;

        registry.register(Box::new(transitions.clone()))?;
        registry.register(Box::new(uploads.clone()))?;
        registry.register(Box::new(exports.clone()))?;

        Ok(Self {
            registry,
            transitions,
            uploads,
            exports,
        })
    }
}

/// Install the `metrics` recorder and the workflow registry. Safe to call
/// more than once.
pub fn init_metrics() {
    RECORDER.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    });
    METRICS.get_or_init(|| match PortalMetrics::build() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            tracing::warn!(error = %e, "Workflow metrics not registered");
            None
        }
    });
}

fn portal_metrics() -> Option<&'static PortalMetrics> {
    METRICS.get().and_then(Option::as_ref)
}

pub fn record_transition(action: &str, outcome: &str) {
    if let Some(m) = portal_metrics() {
        m.transitions.with_label_values(&[action, outcome]).inc();
    }
}

pub fn record_upload(field: &str, outcome: &str) {
    if let Some(m) = portal_metrics() {
        m.uploads.with_label_values(&[field, outcome]).inc();
    }
}

pub fn record_export(kind: &str) {
    if let Some(m) = portal_metrics() {
        m.exports.with_label_values(&[kind]).inc();
    }
}

/// Prometheus text exposition of everything recorded so far.
pub fn get_metrics() -> String {
    let mut output = RECORDER
        .get()
        .and_then(Option::as_ref)
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    if let Some(m) = portal_metrics() {
        let mut buffer = Vec::new();
        match TextEncoder::new().encode(&m.registry.gather(), &mut buffer) {
            Ok(()) => output.push_str(&String::from_utf8_lossy(&buffer)),
            Err(e) => tracing::error!(error = %e, "Failed to encode workflow metrics"),
        }
    }

    output
}
