//! Process-wide metrics for the desk
//!
//! Atomic counters for the hot paths, mutex-protected collections for timing
//! samples and per-tool statistics. Exported as JSON at `/metrics`.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Timing samples kept per series
const MAX_SAMPLES: usize = 1000;

pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

pub struct MetricsCollector {
    leads_received: AtomicU64,
    leads_processing: AtomicU64,
    leads_processed: AtomicU64,
    leads_failed: AtomicU64,
    leads_rejected: AtomicU64,
    processing_times: Mutex<Vec<u64>>,

    follow_ups_generated: AtomicU64,
    follow_ups_failed: AtomicU64,
    leads_marked_followed_up: AtomicU64,
    leads_closed: AtomicU64,

    llm_calls: AtomicU64,
    llm_failures: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    llm_times: Mutex<Vec<u64>>,

    tool_stats: Mutex<HashMap<String, ToolExecutionStats>>,

    desk_state: Mutex<String>,
    uptime_start: AtomicU64,
    healthy: AtomicBool,
    last_health_check: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let now = current_timestamp();
        Self {
            leads_received: AtomicU64::new(0),
            leads_processing: AtomicU64::new(0),
            leads_processed: AtomicU64::new(0),
            leads_failed: AtomicU64::new(0),
            leads_rejected: AtomicU64::new(0),
            processing_times: Mutex::new(Vec::new()),
            follow_ups_generated: AtomicU64::new(0),
            follow_ups_failed: AtomicU64::new(0),
            leads_marked_followed_up: AtomicU64::new(0),
            leads_closed: AtomicU64::new(0),
            llm_calls: AtomicU64::new(0),
            llm_failures: AtomicU64::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            llm_times: Mutex::new(Vec::new()),
            tool_stats: Mutex::new(HashMap::new()),
            desk_state: Mutex::new("starting".to_string()),
            uptime_start: AtomicU64::new(now),
            healthy: AtomicBool::new(true),
            last_health_check: AtomicU64::new(now),
        }
    }

    // Leads

    pub fn lead_received(&self) {
        self.leads_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Submission refused before processing (blank name or message)
    pub fn lead_rejected(&self) {
        self.leads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lead_processing_started(&self) {
        self.leads_processing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lead_processed(&self, duration: Duration) {
        self.leads_processed.fetch_add(1, Ordering::Relaxed);
        self.finish_processing(duration);
    }

    pub fn lead_failed(&self, duration: Duration) {
        self.leads_failed.fetch_add(1, Ordering::Relaxed);
        self.finish_processing(duration);
    }

    fn finish_processing(&self, duration: Duration) {
        // Saturating: a reset between start and finish must not wrap
        let _ = self
            .leads_processing
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        push_sample(&self.processing_times, duration);
    }

    // Follow-ups and manual actions

    pub fn follow_up_generated(&self) {
        self.follow_ups_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn follow_up_failed(&self) {
        self.follow_ups_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lead_marked_followed_up(&self) {
        self.leads_marked_followed_up.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lead_closed(&self) {
        self.leads_closed.fetch_add(1, Ordering::Relaxed);
    }

    // LLM

    pub fn llm_call_completed(&self, duration: Duration, prompt_tokens: u32, completion_tokens: u32) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens
            .fetch_add(u64::from(prompt_tokens), Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(u64::from(completion_tokens), Ordering::Relaxed);
        push_sample(&self.llm_times, duration);
    }

    pub fn llm_call_failed(&self, duration: Duration) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        self.llm_failures.fetch_add(1, Ordering::Relaxed);
        push_sample(&self.llm_times, duration);
    }

    // Tools

    pub fn tool_executed(&self, tool_name: &str, duration: Duration, success: bool) {
        if let Ok(mut stats) = self.tool_stats.lock() {
            let entry = stats
                .entry(tool_name.to_string())
                .or_insert_with(|| ToolExecutionStats::new(tool_name));
            entry.record(duration, success);
        }
    }

    // Lifecycle

    pub fn set_desk_state(&self, state: &str) {
        if let Ok(mut current) = self.desk_state.lock() {
            *current = state.to_string();
        }
    }

    pub fn update_health_status(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
        self.last_health_check
            .store(current_timestamp(), Ordering::Relaxed);
    }

    /// Reset everything (tests only need this)
    pub fn reset(&self) {
        for counter in [
            &self.leads_received,
            &self.leads_processing,
            &self.leads_processed,
            &self.leads_failed,
            &self.leads_rejected,
            &self.follow_ups_generated,
            &self.follow_ups_failed,
            &self.leads_marked_followed_up,
            &self.leads_closed,
            &self.llm_calls,
            &self.llm_failures,
            &self.prompt_tokens,
            &self.completion_tokens,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut times) = self.processing_times.lock() {
            times.clear();
        }
        if let Ok(mut times) = self.llm_times.lock() {
            times.clear();
        }
        if let Ok(mut stats) = self.tool_stats.lock() {
            stats.clear();
        }
        self.set_desk_state("starting");
        let now = current_timestamp();
        self.uptime_start.store(now, Ordering::Relaxed);
        self.healthy.store(true, Ordering::Relaxed);
        self.last_health_check.store(now, Ordering::Relaxed);
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let processing = timing_summary(&self.processing_times);
        let llm_timing = timing_summary(&self.llm_times);

        MetricsSnapshot {
            leads: LeadMetrics {
                received: self.leads_received.load(Ordering::Relaxed),
                processing: self.leads_processing.load(Ordering::Relaxed),
                processed: self.leads_processed.load(Ordering::Relaxed),
                failed: self.leads_failed.load(Ordering::Relaxed),
                rejected: self.leads_rejected.load(Ordering::Relaxed),
                avg_processing_time_ms: processing.avg,
                processing_time_p50_ms: processing.p50,
                processing_time_p95_ms: processing.p95,
                processing_time_p99_ms: processing.p99,
            },
            follow_ups: FollowUpMetrics {
                generated: self.follow_ups_generated.load(Ordering::Relaxed),
                failed: self.follow_ups_failed.load(Ordering::Relaxed),
                marked_followed_up: self.leads_marked_followed_up.load(Ordering::Relaxed),
                closed: self.leads_closed.load(Ordering::Relaxed),
            },
            llm: LlmMetrics {
                calls: self.llm_calls.load(Ordering::Relaxed),
                failures: self.llm_failures.load(Ordering::Relaxed),
                prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
                completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
                avg_latency_ms: llm_timing.avg,
                latency_p95_ms: llm_timing.p95,
            },
            tools: self.tool_metrics(),
            lifecycle: LifecycleMetrics {
                current_state: self
                    .desk_state
                    .lock()
                    .map(|s| s.clone())
                    .unwrap_or_else(|_| "unknown".to_string()),
                uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
                healthy: self.healthy.load(Ordering::Relaxed),
                last_health_check: self.last_health_check.load(Ordering::Relaxed),
            },
            timestamp: now,
        }
    }

    fn tool_metrics(&self) -> ToolMetrics {
        let Ok(stats) = self.tool_stats.lock() else {
            return ToolMetrics::default();
        };

        let mut metrics = ToolMetrics::default();
        let mut total_time = 0u64;
        let mut total_samples = 0u64;

        for (name, stats) in stats.iter() {
            metrics.tool_stats.insert(name.clone(), stats.snapshot());
            metrics.total_executions += stats.executions;
            metrics.total_failures += stats.failures;
            total_time += stats.execution_times.iter().sum::<u64>();
            total_samples += stats.execution_times.len() as u64;
        }

        if total_samples > 0 {
            metrics.avg_execution_time_ms = total_time as f64 / total_samples as f64;
        }
        metrics
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct ToolExecutionStats {
    name: String,
    executions: u64,
    failures: u64,
    execution_times: Vec<u64>,
    last_execution: u64,
}

impl ToolExecutionStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            executions: 0,
            failures: 0,
            execution_times: Vec::new(),
            last_execution: 0,
        }
    }

    fn record(&mut self, duration: Duration, success: bool) {
        self.executions += 1;
        if !success {
            self.failures += 1;
        }
        self.last_execution = current_timestamp();
        self.execution_times.push(duration.as_millis() as u64);
        if self.execution_times.len() > MAX_SAMPLES {
            self.execution_times.remove(0);
        }
    }

    fn snapshot(&self) -> ToolExecutionStatsSnapshot {
        let avg_execution_time_ms = if self.execution_times.is_empty() {
            0.0
        } else {
            self.execution_times.iter().sum::<u64>() as f64 / self.execution_times.len() as f64
        };
        let success_rate = if self.executions == 0 {
            0.0
        } else {
            (self.executions - self.failures) as f64 / self.executions as f64
        };

        ToolExecutionStatsSnapshot {
            name: self.name.clone(),
            executions: self.executions,
            failures: self.failures,
            avg_execution_time_ms,
            last_execution: self.last_execution,
            success_rate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub leads: LeadMetrics,
    pub follow_ups: FollowUpMetrics,
    pub llm: LlmMetrics,
    pub tools: ToolMetrics,
    pub lifecycle: LifecycleMetrics,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct LeadMetrics {
    pub received: u64,
    pub processing: u64,
    pub processed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub avg_processing_time_ms: f64,
    pub processing_time_p50_ms: f64,
    pub processing_time_p95_ms: f64,
    pub processing_time_p99_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct FollowUpMetrics {
    pub generated: u64,
    pub failed: u64,
    pub marked_followed_up: u64,
    pub closed: u64,
}

#[derive(Debug, Serialize)]
pub struct LlmMetrics {
    pub calls: u64,
    pub failures: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub avg_latency_ms: f64,
    pub latency_p95_ms: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct ToolMetrics {
    pub tool_stats: HashMap<String, ToolExecutionStatsSnapshot>,
    pub total_executions: u64,
    pub total_failures: u64,
    pub avg_execution_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct ToolExecutionStatsSnapshot {
    pub name: String,
    pub executions: u64,
    pub failures: u64,
    pub avg_execution_time_ms: f64,
    pub last_execution: u64,
    pub success_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct LifecycleMetrics {
    pub current_state: String,
    pub uptime_seconds: u64,
    pub healthy: bool,
    pub last_health_check: u64,
}

#[derive(Debug, Default)]
struct TimingSummary {
    avg: f64,
    p50: f64,
    p95: f64,
    p99: f64,
}

fn push_sample(samples: &Mutex<Vec<u64>>, duration: Duration) {
    if let Ok(mut times) = samples.lock() {
        times.push(duration.as_millis() as u64);
        if times.len() > MAX_SAMPLES {
            times.remove(0);
        }
    }
}

fn timing_summary(samples: &Mutex<Vec<u64>>) -> TimingSummary {
    let Ok(times) = samples.lock() else {
        return TimingSummary::default();
    };
    if times.is_empty() {
        return TimingSummary::default();
    }

    let mut sorted = times.clone();
    sorted.sort_unstable();
    TimingSummary {
        avg: sorted.iter().sum::<u64>() as f64 / sorted.len() as f64,
        p50: percentile(&sorted, 50.0),
        p95: percentile(&sorted, 95.0),
        p99: percentile(&sorted, 99.0),
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Linear interpolation between closest ranks
fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;
    lower + (upper - lower) * index.fract()
}
