//! Persistent retry loop for the DSE endpoints: a fixed attempt ceiling
//! with linear delay plus jitter between attempts. Non-200 responses,
//! undecodable JSON and empty payloads all count as failed attempts.

use std::{collections::HashMap, time::Duration};

use rand::Rng;
use serde_json::Value;

use crate::constants;
use crate::http::client;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,    // Attempt ceiling, including the first try.
    pub base_delay_secs: f64, // Linear factor: delay before attempt n+1 is base * n.
    pub max_delay_secs: f64,  // Clamp applied before the jitter.
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: constants::RETRY_MAX_ATTEMPTS,
            base_delay_secs: constants::RETRY_BASE_DELAY_SECS,
            max_delay_secs: constants::RETRY_MAX_DELAY_SECS,
        }
    }
}

impl RetryPolicy {
    // Delay before the given retry (1-based: first retry waits base * 1).
    fn delay_before_retry(&self, retry: u32) -> f64 {
        (self.base_delay_secs * retry as f64).min(self.max_delay_secs)
    }
}

/// The records extracted from one endpoint plus how hard it was to get them.
#[derive(Debug)]
pub struct FetchSuccess {
    pub records: Vec<Value>,
    pub attempts: u32,
}

/// What went wrong after exhausting the attempt ceiling.
#[derive(Debug)]
pub struct FetchFailure {
    pub error: String,
    pub status_code: Option<u16>,
    pub attempts: u32,
}

/// Fetches one endpoint, retrying until records come back or the ceiling
/// is hit. Sleeps between attempts; the caller processes sources strictly
/// one after another.
pub async fn fetch_json_records(
    url: &str,
    policy: &RetryPolicy,
) -> Result<FetchSuccess, FetchFailure> {
    let mut last_error = String::from("no attempts made");
    let mut last_status = None;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
            let delay = policy.delay_before_retry(attempt - 1) + jitter;
            log::debug!("waiting {:.1}s before attempt {}/{} for {}",
                delay, attempt, policy.max_attempts, url);
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }

        match client::get_json::<Value>(url, HashMap::new()).await {
            Ok(payload) => match probe_records(&payload) {
                Some(records) => {
                    return Ok(FetchSuccess {
                        records,
                        attempts: attempt,
                    });
                }
                None => {
                    last_error = "empty or unrecognized payload".to_string();
                    last_status = Some(200);
                    log::warn!("attempt {}/{}: empty payload from {}",
                        attempt, policy.max_attempts, url);
                }
            },
            Err(err) => {
                last_status = err.status_code().or(last_status);
                last_error = err.to_string();
                log::warn!("attempt {}/{} failed for {}: {}",
                    attempt, policy.max_attempts, url, last_error);
            }
        }
    }

    Err(FetchFailure {
        error: last_error,
        status_code: last_status,
        attempts: policy.max_attempts,
    })
}

/// Pulls the record list out of a decoded payload. Accepts a top-level
/// array, an object with a list under one of the usual wrapper keys, or
/// a bare non-empty object treated as a single record. Empty payloads —
/// including a wrapper object whose list came back empty — yield None so
/// the caller retries.
pub fn probe_records(payload: &Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) if !items.is_empty() => Some(items.clone()),
        Value::Object(map) => {
            let mut wrapper = false;
            for key in ["data", "results", "items", "records"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    if !items.is_empty() {
                        return Some(items.clone());
                    }
                    wrapper = true;
                }
            }
            // A recognized wrapper with nothing in it is an empty day,
            // not a record about an empty day.
            if wrapper || map.is_empty() {
                None
            } else {
                Some(vec![payload.clone()])
            }
        }
        _ => None,
    }
}
