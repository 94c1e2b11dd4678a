//! Request plumbing shared by the REST adapters.

use serde_json::Value;
use std::future::Future;
use std::time::Instant;
use tracing::warn;

use super::GitProviders;
use crate::error::GitError;
use crate::observability::metrics;

/// Append path segments to `base`, percent-encoding each one
///
/// Segments may contain `/` (GitLab file paths, group paths); they are kept
/// as a single encoded segment.
pub(crate) fn url_with_segments(base: &str, segments: &[&str]) -> Result<reqwest::Url, String> {
    let mut url = reqwest::Url::parse(base).map_err(|e| format!("invalid base URL '{base}': {e}"))?;
    url.path_segments_mut()
        .map_err(|()| format!("base URL '{base}' cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send a request and decode the JSON body of a 2xx response
///
/// Empty bodies decode to `Value::Null`. Non-2xx responses become
/// [`GitError::Api`] carrying the provider's `message` field when present.
pub(crate) async fn send_json(
    provider: GitProviders,
    operation: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<(u16, Value), GitError> {
    let response = request.send().await.map_err(|source| GitError::Transport {
        provider,
        operation,
        source,
    })?;
    let status = response.status();
    let body = response.text().await.map_err(|source| GitError::Transport {
        provider,
        operation,
        source,
    })?;

    if !status.is_success() {
        return Err(GitError::Api {
            provider,
            operation,
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    if body.trim().is_empty() {
        return Ok((status.as_u16(), Value::Null));
    }
    let value = serde_json::from_str(&body).map_err(|e| GitError::InvalidResponse {
        provider,
        operation,
        message: e.to_string(),
    })?;
    Ok((status.as_u16(), value))
}

/// Extract a readable message from a provider error body
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    for key in ["message", "error", "error_description"] {
        match value.get(key) {
            Some(Value::String(s)) => return s.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }
    value.to_string()
}

/// Record metrics for one adapter call
pub(crate) async fn observe<T, F>(
    provider: GitProviders,
    operation: &'static str,
    call: F,
) -> Result<T, GitError>
where
    F: Future<Output = Result<T, GitError>>,
{
    let start = Instant::now();
    let result = call.await;
    match &result {
        Ok(_) => metrics::record_git_operation(
            provider.as_str(),
            operation,
            start.elapsed().as_secs_f64(),
        ),
        Err(e) => {
            metrics::increment_git_operation_errors(provider.as_str(), operation);
            warn!(provider = %provider, operation, error = %e, "git operation failed");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_with_segments_encodes_slashes() {
        let url = url_with_segments(
            "https://gitlab.example.com/api/v4",
            &["projects", "42", "repository", "files", ".backstage/catalog-info.yaml"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.example.com/api/v4/projects/42/repository/files/.backstage%2Fcatalog-info.yaml"
        );
    }

    #[test]
    fn test_url_with_segments_handles_trailing_slash() {
        let url = url_with_segments("https://api.github.com/", &["orgs", "acme", "repos"]).unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/orgs/acme/repos");
    }

    #[test]
    fn test_error_message_prefers_message_field() {
        assert_eq!(
            error_message(r#"{"message":"A file with this name already exists"}"#),
            "A file with this name already exists"
        );
        assert_eq!(
            error_message(r#"{"message":{"name":["has already been taken"]}}"#),
            r#"{"name":["has already been taken"]}"#
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
