use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::events::RequestEvent;

/// Percentiles reported in the summary.
pub const PERCENTILES: [f64; 4] = [0.50, 0.90, 0.95, 0.99];

/// Bucket a response time so the histogram stays small on long runs:
/// exact below 100 ms, then two significant digits below 1 s, then three.
pub fn round_response_time(ms: u64) -> u64 {
    let round_to = |step: u64| (ms + step / 2) / step * step;
    match ms {
        0..=99 => ms,
        100..=999 => round_to(10),
        1_000..=9_999 => round_to(100),
        _ => round_to(1_000),
    }
}

#[derive(Debug, Default, Clone)]
struct StatsEntry {
    num_requests: u64,
    num_failures: u64,
    total_response_time: u64,
    min_response_time: Option<u64>,
    max_response_time: u64,
    response_times: BTreeMap<u64, u64>,
    errors: BTreeMap<String, u64>,
}

impl StatsEntry {
    fn record(&mut self, event: &RequestEvent) {
        let rt = event.response_time_ms;
        self.num_requests += 1;
        self.total_response_time += rt;
        self.min_response_time = Some(self.min_response_time.map_or(rt, |m| m.min(rt)));
        self.max_response_time = self.max_response_time.max(rt);
        *self.response_times.entry(round_response_time(rt)).or_default() += 1;

        if let Some(err) = event.outcome.error() {
            self.num_failures += 1;
            *self.errors.entry(err.to_string()).or_default() += 1;
        }
    }

    fn merge(&mut self, other: &StatsEntry) {
        self.num_requests += other.num_requests;
        self.num_failures += other.num_failures;
        self.total_response_time += other.total_response_time;
        self.min_response_time = match (self.min_response_time, other.min_response_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_response_time = self.max_response_time.max(other.max_response_time);
        for (rt, count) in &other.response_times {
            *self.response_times.entry(*rt).or_default() += count;
        }
        for (msg, count) in &other.errors {
            *self.errors.entry(msg.clone()).or_default() += count;
        }
    }

    /// Smallest bucketed response time covering `percent` of the requests.
    fn percentile(&self, percent: f64) -> u64 {
        if self.num_requests == 0 {
            return 0;
        }
        let wanted = ((self.num_requests as f64) * percent).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (rt, count) in &self.response_times {
            seen += count;
            if seen >= wanted {
                return *rt;
            }
        }
        self.max_response_time
    }

    fn summarize(&self, request_type: &str, name: &str, elapsed: Duration) -> EntrySummary {
        let secs = elapsed.as_secs_f64();
        EntrySummary {
            request_type: request_type.to_string(),
            name: name.to_string(),
            num_requests: self.num_requests,
            num_failures: self.num_failures,
            failure_ratio: ratio(self.num_failures, self.num_requests),
            avg_response_time_ms: if self.num_requests == 0 {
                0.0
            } else {
                self.total_response_time as f64 / self.num_requests as f64
            },
            min_response_time_ms: self.min_response_time.unwrap_or(0),
            max_response_time_ms: self.max_response_time,
            median_response_time_ms: self.percentile(PERCENTILES[0]),
            p90_response_time_ms: self.percentile(PERCENTILES[1]),
            p95_response_time_ms: self.percentile(PERCENTILES[2]),
            p99_response_time_ms: self.percentile(PERCENTILES[3]),
            requests_per_sec: if secs > 0.0 {
                self.num_requests as f64 / secs
            } else {
                0.0
            },
            errors: self
                .errors
                .iter()
                .map(|(message, count)| ErrorSummary {
                    message: message.clone(),
                    count: *count,
                })
                .collect(),
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Thread-safe aggregation of every reported request, keyed by
/// `(request_type, name)`.
#[derive(Debug)]
pub struct StatsCollector {
    started: Instant,
    entries: Mutex<HashMap<(String, String), StatsEntry>>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, event: &RequestEvent) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry((event.request_type.clone(), event.name.clone()))
            .or_default()
            .record(event);
    }

    pub fn summary(&self) -> StatsSummary {
        self.summary_at(self.started.elapsed())
    }

    pub fn summary_at(&self, elapsed: Duration) -> StatsSummary {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let mut keys: Vec<_> = entries.keys().cloned().collect();
        keys.sort();

        let mut total = StatsEntry::default();
        let mut summaries = Vec::with_capacity(keys.len());
        for key in &keys {
            let entry = &entries[key];
            total.merge(entry);
            summaries.push(entry.summarize(&key.0, &key.1, elapsed));
        }

        StatsSummary {
            elapsed_secs: elapsed.as_secs_f64(),
            entries: summaries,
            total: total.summarize("", "Aggregated", elapsed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorSummary {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub request_type: String,
    pub name: String,
    pub num_requests: u64,
    pub num_failures: u64,
    pub failure_ratio: f64,
    pub avg_response_time_ms: f64,
    pub min_response_time_ms: u64,
    pub max_response_time_ms: u64,
    pub median_response_time_ms: u64,
    pub p90_response_time_ms: u64,
    pub p95_response_time_ms: u64,
    pub p99_response_time_ms: u64,
    pub requests_per_sec: f64,
    pub errors: Vec<ErrorSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub elapsed_secs: f64,
    pub entries: Vec<EntrySummary>,
    pub total: EntrySummary,
}

impl StatsSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<14} {:<32} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "Type", "Name", "# reqs", "# fails", "Avg", "Min", "Max", "Med", "p95", "req/s"
        )?;
        for entry in self.entries.iter().chain(std::iter::once(&self.total)) {
            writeln!(
                f,
                "{:<14} {:<32} {:>8} {:>8} {:>8.0} {:>8} {:>8} {:>8} {:>8} {:>8.2}",
                entry.request_type,
                entry.name,
                entry.num_requests,
                entry.num_failures,
                entry.avg_response_time_ms,
                entry.min_response_time_ms,
                entry.max_response_time_ms,
                entry.median_response_time_ms,
                entry.p95_response_time_ms,
                entry.requests_per_sec,
            )?;
        }

        if !self.total.errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "{:>8}  Error", "# occ")?;
            for error in &self.total.errors {
                writeln!(f, "{:>8}  {}", error.count, error.message)?;
            }
        }
        Ok(())
    }
}
