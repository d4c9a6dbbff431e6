//! crates/study_assistant_core/src/resilience.rs
//!
//! Bounded retry with exponential backoff, and the ordered model-fallback loop
//! built on top of it. Both are strictly sequential: at most one call is in
//! flight per invocation.

use crate::ports::{PortError, PortResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// How many attempts a single model gets, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// The wait after the failed attempt at `attempt` (0-based): `initial * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

//=========================================================================================
// Failure Classification
//=========================================================================================

/// What the fallback loop should make of a failed model attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Rate limit or exhausted quota for this model.
    Quota,
    /// The model does not exist or is not available to this key.
    ModelUnavailable,
    /// Temporary unavailability or a transport failure.
    Transient,
    /// Anything else. Trying another model will not help.
    Fatal,
}

fn message_contains(err: &PortError, needle: &str) -> bool {
    err.to_string().to_lowercase().contains(needle)
}

/// Whether a failure is worth retrying against the same model.
pub fn is_retryable(err: &PortError) -> bool {
    matches!(err.status(), Some(429) | Some(503))
        || message_contains(err, "quota")
        || message_contains(err, "fetch")
}

pub fn is_quota_error(err: &PortError) -> bool {
    err.status() == Some(429) || message_contains(err, "429") || message_contains(err, "quota")
}

pub fn is_not_found_error(err: &PortError) -> bool {
    err.status() == Some(404) || message_contains(err, "404") || message_contains(err, "not found")
}

pub fn classify(err: &PortError) -> FailureClass {
    if matches!(err, PortError::MissingApiKey | PortError::InvalidInput(_)) {
        FailureClass::Fatal
    } else if is_quota_error(err) {
        FailureClass::Quota
    } else if is_not_found_error(err) {
        FailureClass::ModelUnavailable
    } else if is_retryable(err) {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}

//=========================================================================================
// Retry
//=========================================================================================

/// Runs `op` until it succeeds, fails with a non-retryable error, or has been
/// attempted `policy.max_retries` times. The last error is returned unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> PortResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PortResult<T>>,
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;
    loop {
        debug!(attempt = attempt + 1, of = attempts, "Calling model");
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

//=========================================================================================
// Model Fallback
//=========================================================================================

/// Tries each candidate model in order, each wrapped in [`with_retry`].
///
/// Quota, not-found and exhausted transient failures move on to the next
/// candidate. Any other failure is returned immediately.
pub async fn with_model_fallback<T, F, Fut>(
    models: &[String],
    policy: &RetryPolicy,
    mut op: F,
) -> PortResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = PortResult<T>>,
{
    let mut last_error: Option<PortError> = None;

    for (index, model) in models.iter().enumerate() {
        info!(model = %model, candidate = index + 1, of = models.len(), "Trying model");
        match with_retry(policy, || op(model.clone())).await {
            Ok(value) => {
                info!(model = %model, "Model call succeeded");
                return Ok(value);
            }
            Err(e) => match classify(&e) {
                FailureClass::Fatal => {
                    warn!(model = %model, error = %e, "Model call failed, not trying other models");
                    return Err(e);
                }
                class => {
                    warn!(model = %model, ?class, error = %e, "Model failed, switching to next candidate");
                    last_error = Some(e);
                }
            },
        }
    }

    Err(exhausted_error(last_error))
}

/// Turns the last failure of an exhausted fallback chain into a user-facing error.
pub fn exhausted_error(last_error: Option<PortError>) -> PortError {
    let message = match &last_error {
        Some(e) if is_quota_error(e) => {
            "API Quota exceeded for every available model. Please wait a minute and try again, or check your plan and billing details.".to_string()
        }
        Some(e) if is_not_found_error(e) => {
            "No available model could be found. Please check that your API key is valid and has access to the configured Gemini models.".to_string()
        }
        Some(e) => format!("Failed to get a response after trying multiple models. Last error: {}", e),
        None => "Failed to get a response after trying multiple models. Last error: no candidate models are configured".to_string(),
    };
    PortError::ModelsExhausted(message)
}
