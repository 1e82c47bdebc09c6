//! URL helpers for building model endpoint addresses.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use sweetscout::utils::url::normalize_base_url;
///
/// assert_eq!(
///     normalize_base_url("https://generativelanguage.googleapis.com/v1beta/"),
///     "https://generativelanguage.googleapis.com/v1beta"
/// );
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path,
/// never producing a double slash at the seam.
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Streaming generation endpoint for `model`, delivering server-sent events.
///
/// ```
/// use sweetscout::utils::url::stream_generate_url;
///
/// assert_eq!(
///     stream_generate_url("https://example.com/v1beta/", "gemini-2.5-flash"),
///     "https://example.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
/// );
/// ```
pub fn stream_generate_url(base_url: &str, model: &str) -> String {
    let model = model.trim().trim_start_matches("models/");
    construct_api_url(
        base_url,
        &format!("models/{model}:streamGenerateContent?alt=sse"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.example.com/v1"),
            "https://api.example.com/v1"
        );
        assert_eq!(
            normalize_base_url("https://api.example.com/v1///"),
            "https://api.example.com/v1"
        );
        assert_eq!(
            normalize_base_url(" https://api.example.com/ "),
            "https://api.example.com"
        );
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("https://api.example.com/v1/", "/models"),
            "https://api.example.com/v1/models"
        );
        assert_eq!(
            construct_api_url("http://localhost:8080", "models"),
            "http://localhost:8080/models"
        );
    }

    #[test]
    fn stream_url_accepts_prefixed_model_ids() {
        assert_eq!(
            stream_generate_url("http://localhost:8080", "models/gemini-pro"),
            "http://localhost:8080/models/gemini-pro:streamGenerateContent?alt=sse"
        );
    }
}
