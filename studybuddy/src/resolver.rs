//! Model resolution: pick the first candidate model that answers a trial call.
//!
//! Every probe failure (not found, permission, quota, timeout) means "try the
//! next one". Nothing is cached; callers resolve again for every submission.

use std::fmt;
use std::future::Future;

/// Try `candidates` in order and return the first one whose probe succeeds.
///
/// Returns `None` when the list is empty or every probe fails. Candidates after
/// the first success are never probed.
pub fn resolve<I, S, F, E>(candidates: I, mut probe: F) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(&str) -> Result<(), E>,
    E: fmt::Display,
{
    for candidate in candidates {
        let id = candidate.as_ref();
        match probe(id) {
            Ok(()) => {
                tracing::info!(model = id, "resolved model");
                return Some(id.to_string());
            }
            Err(e) => tracing::debug!(model = id, error = %e, "probe failed, trying next candidate"),
        }
    }
    None
}

/// Async form of [`resolve`] for probes that make network calls.
pub async fn resolve_async<I, S, F, Fut, E>(candidates: I, mut probe: F) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    for candidate in candidates {
        let id = candidate.as_ref().to_string();
        match probe(id.clone()).await {
            Ok(()) => {
                tracing::info!(model = %id, "resolved model");
                return Some(id);
            }
            Err(e) => tracing::debug!(model = %id, error = %e, "probe failed, trying next candidate"),
        }
    }
    None
}

/// Outcome of probing a single candidate, for diagnostics.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub model: String,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Probe every candidate without short-circuiting. Used by health checks only.
pub async fn probe_each<I, S, F, Fut, E>(candidates: I, mut probe: F) -> Vec<ProbeOutcome>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    let mut outcomes = Vec::new();
    for candidate in candidates {
        let model = candidate.as_ref().to_string();
        let error = probe(model.clone()).await.err().map(|e| e.to_string());
        outcomes.push(ProbeOutcome { model, error });
    }
    outcomes
}

/// Strip the catalog's `models/` prefix so catalog and configured IDs compare equal.
pub fn normalize_model_id(id: &str) -> &str {
    id.trim().strip_prefix("models/").unwrap_or(id.trim())
}

/// Stable reorder putting `flash` models first; they are the cheapest to probe and call.
pub fn order_flash_first(mut ids: Vec<String>) -> Vec<String> {
    ids.sort_by_key(|id| !id.contains("flash"));
    ids
}
