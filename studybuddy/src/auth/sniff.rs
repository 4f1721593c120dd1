// ---------------------------------------------------------------------------
// Environment variable sniffing
// ---------------------------------------------------------------------------

/// Environment variables checked for a Gemini API key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Resolve the API key. Resolution order:
/// 1. Explicit value (config file or flag; trimmed, ignored if empty)
/// 2. `GOOGLE_API_KEY`, then `GEMINI_API_KEY`
pub fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    resolve_with(explicit, |name| std::env::var(name).ok())
}

fn resolve_with(explicit: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(raw) = explicit {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_owned());
        }
    }

    for &env_var in API_KEY_ENV_VARS {
        if let Some(val) = lookup(env_var) {
            let val = val.trim();
            if !val.is_empty() {
                return Some(val.to_owned());
            }
        }
    }

    None
}
