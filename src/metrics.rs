//! Native call instrumentation.
//!
//! `metrics` records OpenTelemetry counters and a duration histogram for every native
//! call; `tracing` opens a span around it. Both are optional features.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
    KeyValue,
};

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<SpannerMetrics> = Lazy::new(SpannerMetrics::init);

/// Kind of native call, used as the `kind` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Mutation,
    SchemaUpdate,
    Database,
}

impl CallKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Query => "query",
            CallKind::Mutation => "mutation",
            CallKind::SchemaUpdate => "schema_update",
            CallKind::Database => "database",
        }
    }
}

#[cfg(feature = "metrics")]
pub struct SpannerMetrics {
    pub calls_total: Counter<u64>,
    pub call_errors_total: Counter<u64>,
    pub call_duration: Histogram<f64>,
}

#[cfg(feature = "metrics")]
impl SpannerMetrics {
    pub fn init() -> Self {
        let meter = global::meter("spanguard");

        let calls_total = meter
            .u64_counter("spanguard_native_calls_total")
            .with_description("Total native calls issued")
            .build();

        let call_errors_total = meter
            .u64_counter("spanguard_native_call_errors_total")
            .with_description("Native calls rejected by the engine")
            .build();

        let call_duration = meter
            .f64_histogram("spanguard_native_call_duration_seconds")
            .with_description("Duration of native calls")
            .build();

        Self {
            calls_total,
            call_errors_total,
            call_duration,
        }
    }

    pub fn record_call(&self, kind: CallKind, elapsed: std::time::Duration) {
        let attrs = [KeyValue::new("kind", kind.as_str())];
        self.calls_total.add(1, &attrs);
        self.call_duration.record(elapsed.as_secs_f64(), &attrs);
    }

    pub fn record_error(&self, kind: CallKind) {
        self.call_errors_total
            .add(1, &[KeyValue::new("kind", kind.as_str())]);
    }
}

/// Record one finished native call. A no-op without the `metrics` feature.
#[allow(unused_variables)]
pub(crate) fn observe<T, E>(kind: CallKind, start: std::time::Instant, result: &Result<T, E>) {
    #[cfg(feature = "metrics")]
    {
        METRICS.record_call(kind, start.elapsed());
        if result.is_err() {
            METRICS.record_error(kind);
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    pub fn execute_query_span(sql: &str) -> Span {
        tracing::debug_span!("spanguard.query", sql = %sql)
    }

    pub fn mutation_span(verb: &'static str, table: &str) -> Span {
        tracing::debug_span!("spanguard.mutation", verb, table = %table)
    }

    pub fn schema_update_span(statements: usize) -> Span {
        tracing::info_span!("spanguard.schema_update", statements)
    }

    pub fn acquire_connection_span(database: &str) -> Span {
        tracing::debug_span!("spanguard.connect", database = %database)
    }

    pub fn begin_transaction_span() -> Span {
        tracing::debug_span!("spanguard.transaction.begin")
    }

    pub fn commit_transaction_span() -> Span {
        tracing::debug_span!("spanguard.transaction.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        tracing::debug_span!("spanguard.transaction.rollback")
    }
}
