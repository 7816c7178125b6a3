//! Metrics for query operations.
//!
//! Counters, histograms and a gauge over operation outcomes, backed by
//! atomics so concurrent operations never lose updates. Values are rendered
//! on demand in Prometheus text exposition format for the transport layer's
//! `/metrics` endpoint.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Histogram buckets for query duration, in seconds.
const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0];

/// Histogram buckets for rows returned per query.
const ROWS_BUCKETS: &[f64] = &[1.0, 10.0, 100.0, 1000.0, 10000.0, 50000.0];

/// A family of counters keyed by label values.
struct CounterVec {
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
    values: RwLock<BTreeMap<Vec<String>, Arc<AtomicU64>>>,
}

impl CounterVec {
    fn new(name: &'static str, help: &'static str, label_names: &'static [&'static str]) -> Self {
        Self {
            name,
            help,
            label_names,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    fn inc(&self, labels: &[&str]) {
        debug_assert_eq!(labels.len(), self.label_names.len());
        let key: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        if let Some(counter) = self.values.read().unwrap_or_else(|e| e.into_inner()).get(&key) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let mut map = self.values.write().unwrap_or_else(|e| e.into_inner());
        map.entry(key)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self, labels: &[&str]) -> u64 {
        let key: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} counter\n", self.name));
        for (key, counter) in self.values.read().unwrap_or_else(|e| e.into_inner()).iter() {
            let labels = format_labels(self.label_names, key);
            out.push_str(&format!(
                "{}{} {}\n",
                self.name,
                labels,
                counter.load(Ordering::Relaxed)
            ));
        }
    }
}

/// A single histogram: cumulative bucket counts plus sum and count.
struct Histogram {
    buckets: &'static [f64],
    counts: Vec<AtomicU64>,
    /// Sum stored in micro-units to keep it atomic.
    sum_micros: AtomicU64,
    total: AtomicU64,
}

impl Histogram {
    fn new(buckets: &'static [f64]) -> Self {
        Self {
            buckets,
            counts: (0..buckets.len()).map(|_| AtomicU64::new(0)).collect(),
            sum_micros: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    fn observe(&self, value: f64) {
        for (i, bound) in self.buckets.iter().enumerate() {
            if value <= *bound {
                self.counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.sum_micros
            .fetch_add((value * 1_000_000.0) as u64, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// A family of histograms keyed by label values.
struct HistogramVec {
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
    buckets: &'static [f64],
    values: RwLock<BTreeMap<Vec<String>, Arc<Histogram>>>,
}

impl HistogramVec {
    fn new(
        name: &'static str,
        help: &'static str,
        label_names: &'static [&'static str],
        buckets: &'static [f64],
    ) -> Self {
        Self {
            name,
            help,
            label_names,
            buckets,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    fn observe(&self, labels: &[&str], value: f64) {
        debug_assert_eq!(labels.len(), self.label_names.len());
        let key: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let hist = {
            if let Some(h) = self.values.read().unwrap_or_else(|e| e.into_inner()).get(&key) {
                h.clone()
            } else {
                let mut map = self.values.write().unwrap_or_else(|e| e.into_inner());
                map.entry(key)
                    .or_insert_with(|| Arc::new(Histogram::new(self.buckets)))
                    .clone()
            }
        };
        hist.observe(value);
    }

    fn count(&self, labels: &[&str]) -> u64 {
        let key: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .map(|h| h.count())
            .unwrap_or(0)
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} histogram\n", self.name));
        for (key, hist) in self.values.read().unwrap_or_else(|e| e.into_inner()).iter() {
            for (i, bound) in hist.buckets.iter().enumerate() {
                let labels = format_labels_with(
                    self.label_names,
                    key,
                    Some(("le", &format_bound(*bound))),
                );
                out.push_str(&format!(
                    "{}_bucket{} {}\n",
                    self.name,
                    labels,
                    hist.counts[i].load(Ordering::Relaxed)
                ));
            }
            let inf_labels = format_labels_with(self.label_names, key, Some(("le", "+Inf")));
            out.push_str(&format!(
                "{}_bucket{} {}\n",
                self.name,
                inf_labels,
                hist.total.load(Ordering::Relaxed)
            ));
            let labels = format_labels(self.label_names, key);
            let sum = hist.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
            out.push_str(&format!("{}_sum{} {}\n", self.name, labels, sum));
            out.push_str(&format!(
                "{}_count{} {}\n",
                self.name,
                labels,
                hist.total.load(Ordering::Relaxed)
            ));
        }
    }
}

fn format_bound(bound: f64) -> String {
    if bound.fract() == 0.0 {
        format!("{}", bound as u64)
    } else {
        format!("{}", bound)
    }
}

fn format_labels(names: &[&str], values: &[String]) -> String {
    format_labels_with(names, values, None)
}

fn format_labels_with(names: &[&str], values: &[String], extra: Option<(&str, &str)>) -> String {
    let mut parts: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(n, v)| format!("{}=\"{}\"", n, v.replace('"', "\\\"")))
        .collect();
    if let Some((k, v)) = extra {
        parts.push(format!("{}=\"{}\"", k, v));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

/// Guard returned by [`MetricsRecorder::begin_execution`]. Decrements the
/// in-flight gauge when dropped, covering every exit path including
/// cancellation.
pub struct InFlightGuard {
    gauge: Arc<AtomicI64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Recorder for all operation metrics.
pub struct MetricsRecorder {
    queries_executed: CounterVec,
    queries_blocked: CounterVec,
    errors: CounterVec,
    query_duration: HistogramVec,
    rows_returned: HistogramVec,
    in_flight: Arc<AtomicI64>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            queries_executed: CounterVec::new(
                "sqlgate_queries_executed_total",
                "Total number of queries executed",
                &["tool", "status"],
            ),
            queries_blocked: CounterVec::new(
                "sqlgate_queries_blocked_total",
                "Total number of queries blocked by policy",
                &["reason"],
            ),
            errors: CounterVec::new(
                "sqlgate_errors_total",
                "Total number of errors",
                &["kind"],
            ),
            query_duration: HistogramVec::new(
                "sqlgate_query_duration_seconds",
                "Query execution duration in seconds",
                &["tool"],
                DURATION_BUCKETS,
            ),
            rows_returned: HistogramVec::new(
                "sqlgate_query_rows_returned",
                "Number of rows returned per query",
                &["tool"],
                ROWS_BUCKETS,
            ),
            in_flight: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Increment the in-flight gauge; the returned guard decrements it on
    /// drop so no exit path can leak a count.
    pub fn begin_execution(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            gauge: self.in_flight.clone(),
        }
    }

    pub fn record_success(&self, tool: &str, duration: Duration, rows: usize) {
        self.queries_executed.inc(&[tool, "success"]);
        self.query_duration.observe(&[tool], duration.as_secs_f64());
        self.rows_returned.observe(&[tool], rows as f64);
    }

    pub fn record_error(&self, tool: &str, kind: &str, duration: Duration) {
        self.queries_executed.inc(&[tool, "error"]);
        self.errors.inc(&[kind]);
        self.query_duration.observe(&[tool], duration.as_secs_f64());
    }

    pub fn record_blocked(&self, reason_category: &str) {
        self.queries_blocked.inc(&[reason_category]);
    }

    /// Count a failure that never reached execution, e.g. a bad format
    /// argument. Does not touch the executed counter.
    pub fn record_request_error(&self, kind: &str) {
        self.errors.inc(&[kind]);
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn executed_count(&self, tool: &str, status: &str) -> u64 {
        self.queries_executed.get(&[tool, status])
    }

    pub fn blocked_count(&self, reason_category: &str) -> u64 {
        self.queries_blocked.get(&[reason_category])
    }

    pub fn error_count(&self, kind: &str) -> u64 {
        self.errors.get(&[kind])
    }

    pub fn duration_observations(&self, tool: &str) -> u64 {
        self.query_duration.count(&[tool])
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn expose(&self) -> String {
        let mut out = String::new();
        self.queries_executed.render(&mut out);
        self.queries_blocked.render(&mut out);
        self.errors.render(&mut out);
        self.query_duration.render(&mut out);
        self.rows_returned.render(&mut out);
        out.push_str("# HELP sqlgate_in_flight_queries Number of currently executing queries\n");
        out.push_str("# TYPE sqlgate_in_flight_queries gauge\n");
        out.push_str(&format!(
            "sqlgate_in_flight_queries {}\n",
            self.in_flight.load(Ordering::Relaxed)
        ));
        out
    }
}
