use thiserror::Error;
use url::Url;

/// Errors that can occur during endpoint validation.
///
/// Messages name the problem but never repeat the URL, which may embed a
/// webhook secret.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL string for use as a feed source or webhook endpoint.
///
/// Rejects anything that is not an absolute `http` or `https` URL with a host.
/// Loopback and private addresses are allowed: self-hosted sinks and local
/// test servers live there.
///
/// # Examples
///
/// ```
/// use feedwatch::util::validate_endpoint;
///
/// let url = validate_endpoint("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_endpoint("file:///etc/passwd").is_err());
/// assert!(validate_endpoint("not a url").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, EndpointError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(EndpointError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(EndpointError::MissingHost);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_endpoint("https://example.com/feed.xml").is_ok());
        assert!(validate_endpoint("http://news.example.org").is_ok());
        assert!(validate_endpoint("https://hooks.slack.com/services/T0/B0/xyz").is_ok());
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert!(validate_endpoint("  https://example.com/feed.xml\n").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_endpoint("file:///etc/passwd"),
            Err(EndpointError::UnsupportedScheme(_))
        ));
        assert!(validate_endpoint("ftp://example.com").is_err());
        assert!(validate_endpoint("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_relative_url_rejected() {
        assert!(matches!(
            validate_endpoint("/feed.xml"),
            Err(EndpointError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_localhost_allowed_for_local_sinks() {
        assert!(validate_endpoint("http://127.0.0.1:8080/hook").is_ok());
        assert!(validate_endpoint("http://localhost/feed").is_ok());
    }

    #[test]
    fn test_error_message_does_not_echo_url() {
        let err = validate_endpoint("gopher://secret-token@example.com").unwrap_err();
        assert!(!err.to_string().contains("secret-token"));
    }
}
