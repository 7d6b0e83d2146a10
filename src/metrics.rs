//! Prometheus metrics (feature `metrics`) and tracing span helpers (feature `tracing`).

#[cfg(feature = "metrics")]
pub use prometheus_metrics::{QuartermasterMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<QuartermasterMetrics> = Lazy::new(QuartermasterMetrics::init);

    pub struct QuartermasterMetrics {
        registry: Registry,
        // keeps the reader registered for the life of the process
        _provider: SdkMeterProvider,
        queries_total: Counter<u64>,
        query_errors_total: Counter<u64>,
        query_duration: Histogram<f64>,
        workflow_events_total: Counter<u64>,
        workflow_rejections_total: Counter<u64>,
        imported_rows_total: Counter<u64>,
    }

    impl QuartermasterMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let provider = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => SdkMeterProvider::builder().with_reader(exporter).build(),
                Err(e) => {
                    log::warn!(
                        "prometheus exporter unavailable, metrics will not be exported: {e}"
                    );
                    SdkMeterProvider::builder().build()
                }
            };
            let meter = provider.meter("quartermaster");

            Self {
                queries_total: meter
                    .u64_counter("quartermaster_queries_total")
                    .with_description("Total SQL statements executed")
                    .build(),
                query_errors_total: meter
                    .u64_counter("quartermaster_query_errors_total")
                    .with_description("SQL statements that failed")
                    .build(),
                query_duration: meter
                    .f64_histogram("quartermaster_query_duration_seconds")
                    .with_description("Duration of SQL statements")
                    .build(),
                workflow_events_total: meter
                    .u64_counter("quartermaster_workflow_events_total")
                    .with_description("Successful workflow state changes by kind")
                    .build(),
                workflow_rejections_total: meter
                    .u64_counter("quartermaster_workflow_rejections_total")
                    .with_description("Workflow operations rejected by validation or permission checks")
                    .build(),
                imported_rows_total: meter
                    .u64_counter("quartermaster_imported_rows_total")
                    .with_description("Property rows written by spreadsheet imports")
                    .build(),
                registry,
                _provider: provider,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        /// `event` is a static name such as `audit.item_checked`.
        pub fn record_event(&self, event: &'static str) {
            self.workflow_events_total
                .add(1, &[KeyValue::new("event", event)]);
        }

        pub fn record_rejection(&self, operation: &'static str) {
            self.workflow_rejections_total
                .add(1, &[KeyValue::new("operation", operation)]);
        }

        pub fn record_imported_rows(&self, rows: u64) {
            self.imported_rows_total.add(rows, &[]);
        }

        /// Render the registry in the Prometheus text exposition format.
        pub fn render(&self) -> Vec<u8> {
            let mut buffer = Vec::new();
            if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
                log::error!("failed to encode metrics: {e}");
            }
            buffer
        }
    }
}

/// Record a successful workflow event; no-op without the `metrics` feature.
#[allow(unused_variables)]
pub fn event(name: &'static str) {
    #[cfg(feature = "metrics")]
    METRICS.record_event(name);
}

/// Record a rejected workflow operation; no-op without the `metrics` feature.
#[allow(unused_variables)]
pub fn rejection(operation: &'static str) {
    #[cfg(feature = "metrics")]
    METRICS.record_rejection(operation);
}

#[allow(unused_variables)]
pub fn imported_rows(rows: u64) {
    #[cfg(feature = "metrics")]
    METRICS.record_imported_rows(rows);
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn execute_query_span(query: &str) -> Span {
        // statement text only, never bound values
        let statement = query.split_whitespace().next().unwrap_or("");
        info_span!("db.query", db.statement = %statement)
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("db.transaction.begin")
    }

    pub fn workflow_span(operation: &'static str) -> Span {
        info_span!("workflow", operation = operation)
    }
}
