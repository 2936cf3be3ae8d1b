//! Optional capture of request/response pairs for diagnostics.
//!
//! Every method is a no-op while the recorder is disabled, and nothing here
//! can fail a call: serialization problems are logged and skipped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_HEADERS: &[&str] = &["x-goog-api-key", "authorization"];

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEBUG_ENV_VAR: &str = "CHATWIRE_DEBUG";

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebugRecord {
    pub id: Uuid,
    /// Insertion order within the recorder; timestamps can tie.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub redacted_url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub request_body: Value,
    pub status_code: Option<u16>,
    pub response_body: Option<Value>,
    pub raw_response: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub ttfb_ms: Option<u64>,
}

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([?&]key=)[^&#]*").expect("static regex is valid"))
}

/// Replaces the `key=` query value with a redaction marker.
pub fn redact_url(url: &str) -> String {
    key_pattern()
        .replace_all(url, format!("${{1}}{REDACTED}"))
        .into_owned()
}

fn redact_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            if SENSITIVE_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                (name.clone(), REDACTED.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug)]
pub struct DebugRecorder {
    enabled: AtomicBool,
    capacity: usize,
    next_sequence: AtomicU64,
    records: DashMap<Uuid, DebugRecord>,
}

impl Default for DebugRecorder {
    fn default() -> Self {
        Self::disabled()
    }
}

impl DebugRecorder {
    pub fn disabled() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            capacity: DEFAULT_CAPACITY,
            next_sequence: AtomicU64::new(0),
            records: DashMap::new(),
        }
    }

    pub fn enabled() -> Self {
        let recorder = Self::disabled();
        recorder.set_enabled(true);
        recorder
    }

    /// Enabled when `CHATWIRE_DEBUG` is `1` or `true`.
    pub fn from_env() -> Self {
        let recorder = Self::disabled();
        let flag = std::env::var(DEBUG_ENV_VAR).unwrap_or_default();
        recorder.set_enabled(matches!(flag.trim(), "1" | "true" | "TRUE" | "True"));
        recorder
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Opens a record for a call; `None` when disabled.
    pub fn record_start<B: Serialize>(
        &self,
        url: &str,
        method: &str,
        headers: &[(String, String)],
        body: &B,
    ) -> Option<Uuid> {
        if !self.is_enabled() {
            return None;
        }

        let request_body = serde_json::to_value(body).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "debug recorder could not serialize request body");
            Value::Null
        });

        let id = Uuid::new_v4();
        self.records.insert(
            id,
            DebugRecord {
                id,
                sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
                timestamp: Utc::now(),
                redacted_url: redact_url(url),
                method: method.to_string(),
                headers: redact_headers(headers),
                request_body,
                status_code: None,
                response_body: None,
                raw_response: None,
                error: None,
                duration_ms: 0,
                ttfb_ms: None,
            },
        );
        self.evict_oldest();
        Some(id)
    }

    pub fn record_success(
        &self,
        id: Option<Uuid>,
        status: u16,
        response: Value,
        duration: Duration,
        ttfb: Option<Duration>,
    ) {
        let Some(id) = id else { return };
        match self.records.get_mut(&id) {
            Some(mut record) => {
                record.status_code = Some(status);
                record.response_body = Some(response);
                record.duration_ms = millis(duration);
                record.ttfb_ms = ttfb.map(millis);
            }
            None => tracing::debug!(%id, "debug record evicted before completion"),
        }
    }

    pub fn record_failure(
        &self,
        id: Option<Uuid>,
        error: &str,
        status: Option<u16>,
        raw_response: Option<String>,
        duration: Duration,
    ) {
        let Some(id) = id else { return };
        match self.records.get_mut(&id) {
            Some(mut record) => {
                record.error = Some(error.to_string());
                record.status_code = status;
                record.raw_response = raw_response;
                record.duration_ms = millis(duration);
            }
            None => tracing::debug!(%id, "debug record evicted before failure"),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<DebugRecord> {
        self.records.get(id).map(|record| record.clone())
    }

    /// All retained records, oldest first.
    pub fn records(&self) -> Vec<DebugRecord> {
        let mut records: Vec<DebugRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.sequence);
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    fn evict_oldest(&self) {
        while self.records.len() > self.capacity {
            let oldest = self
                .records
                .iter()
                .min_by_key(|entry| entry.value().sequence)
                .map(|entry| *entry.key());
            match oldest {
                Some(id) => {
                    self.records.remove(&id);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers() -> Vec<(String, String)> {
        vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("x-goog-api-key".to_string(), "secret".to_string()),
        ]
    }

    #[test]
    fn redacts_key_query_value() {
        assert_eq!(
            redact_url("https://h/v1beta/models/m:streamGenerateContent?key=abc123&alt=sse"),
            "https://h/v1beta/models/m:streamGenerateContent?key=[REDACTED]&alt=sse"
        );
        assert_eq!(
            redact_url("https://h/models/m:generateContent?alt=json&key=abc"),
            "https://h/models/m:generateContent?alt=json&key=[REDACTED]"
        );
        assert_eq!(redact_url("https://h/no-key"), "https://h/no-key");
    }

    #[test]
    fn disabled_recorder_is_a_no_op() {
        let recorder = DebugRecorder::disabled();
        let id = recorder.record_start("https://h?key=k", "POST", &headers(), &json!({}));
        assert!(id.is_none());
        recorder.record_success(id, 200, json!({}), Duration::from_millis(5), None);
        recorder.record_failure(id, "boom", None, None, Duration::from_millis(5));
        assert!(recorder.is_empty());
    }

    #[test]
    fn success_completes_the_record() {
        let recorder = DebugRecorder::enabled();
        let id = recorder.record_start(
            "https://h/m:generateContent?key=k",
            "POST",
            &headers(),
            &json!({"contents": []}),
        );
        recorder.record_success(
            id,
            200,
            json!({"candidates": []}),
            Duration::from_millis(42),
            Some(Duration::from_millis(7)),
        );

        let record = recorder.get(&id.unwrap()).unwrap();
        assert_eq!(record.redacted_url, "https://h/m:generateContent?key=[REDACTED]");
        assert_eq!(record.headers[1], ("x-goog-api-key".to_string(), REDACTED.to_string()));
        assert_eq!(record.request_body, json!({"contents": []}));
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.duration_ms, 42);
        assert_eq!(record.ttfb_ms, Some(7));
        assert!(record.error.is_none());
    }

    #[test]
    fn failure_keeps_raw_response() {
        let recorder = DebugRecorder::enabled();
        let id = recorder.record_start("https://h?key=k", "POST", &[], &json!({}));
        recorder.record_failure(
            id,
            "HTTP 500: oops",
            Some(500),
            Some("<html>oops</html>".to_string()),
            Duration::from_millis(3),
        );

        let record = recorder.records().pop().unwrap();
        assert_eq!(record.error.as_deref(), Some("HTTP 500: oops"));
        assert_eq!(record.status_code, Some(500));
        assert_eq!(record.raw_response.as_deref(), Some("<html>oops</html>"));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let recorder = DebugRecorder::enabled().with_capacity(2);
        let first = recorder.record_start("https://h/1", "POST", &[], &json!(1));
        let second = recorder.record_start("https://h/2", "POST", &[], &json!(2));
        let third = recorder.record_start("https://h/3", "POST", &[], &json!(3));

        assert_eq!(recorder.len(), 2);
        assert!(recorder.get(&first.unwrap()).is_none());
        let ids: Vec<Uuid> = recorder.records().iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![second.unwrap(), third.unwrap()]);
    }

    #[test]
    fn records_keep_insertion_order_within_one_instant() {
        let recorder = DebugRecorder::enabled().with_capacity(64);
        let ids: Vec<Uuid> = (0..64)
            .filter_map(|n| recorder.record_start("https://h", "POST", &[], &json!(n)))
            .collect();

        let listed: Vec<Uuid> = recorder.records().iter().map(|record| record.id).collect();
        assert_eq!(listed, ids);

        recorder.record_start("https://h", "POST", &[], &json!("overflow"));
        assert_eq!(recorder.len(), 64);
        assert!(recorder.get(&ids[0]).is_none());
        assert!(recorder.get(&ids[1]).is_some());
    }
}
