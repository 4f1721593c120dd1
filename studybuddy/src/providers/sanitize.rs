//! Sanitize API error strings: scrub API keys and truncate length.

const MAX_API_ERROR_CHARS: usize = 200;
const REDACTED: &str = "[REDACTED]";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Redact the token following each occurrence of `marker`.
///
/// With `keep_marker` the marker itself survives (`key=[REDACTED]`).
fn redact_after(input: &str, marker: &str, keep_marker: bool) -> String {
    let mut scrubbed = input.to_string();
    let mut search_from = 0;
    loop {
        let Some(rel) = scrubbed[search_from..].find(marker) else {
            break;
        };

        let start = search_from + rel;
        let content_start = start + marker.len();
        let end = token_end(&scrubbed, content_start);

        // A bare marker should not stop future scans.
        if end == content_start {
            search_from = content_start;
            continue;
        }

        let replace_from = if keep_marker { content_start } else { start };
        scrubbed.replace_range(replace_from..end, REDACTED);
        search_from = replace_from + REDACTED.len();
    }
    scrubbed
}

/// Scrub Google API keys (`AIza…`) and `key=` query values from error strings.
pub fn scrub_secret_patterns(input: &str) -> String {
    let scrubbed = redact_after(input, "AIza", false);
    redact_after(&scrubbed, "key=", true)
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let end = scrubbed
        .char_indices()
        .nth(MAX_API_ERROR_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(scrubbed.len());

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response body and status.
///
/// The API status and retry delay are taken from the full body; only the
/// stored text is truncated.
pub fn api_error_body(status: u16, body: &str) -> super::ProviderError {
    super::ProviderError::Http {
        status,
        body: sanitize_api_error(body),
        api_status: super::status::api_status(body),
        retry_after_ms: super::status::retry_after_from_text(body),
    }
}
