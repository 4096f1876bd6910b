//! Endpoint derivation from the service page URL.
//!
//! The user points the client at the page that would serve the browser
//! terminal. The bootstrap request goes to that page's path with
//! `?q=config`, and the WebSocket URL is built from the page's host, the
//! page path minus its last segment, the socket path the server announced,
//! and the page's original query.

use reqwest::Url;
use thiserror::Error;

/// Invalid service URL.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The URL does not parse.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// URL as given
        url: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Only `http` and `https` pages are supported.
    #[error("unsupported scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    /// The URL has no host.
    #[error("URL {0} has no host")]
    MissingHost(String),
}

/// URLs of one terminal service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    page: Url,
}

impl Endpoints {
    /// Parse the page URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the URL is malformed, has no host, or is
    /// not `http(s)`.
    pub fn parse(page: &str) -> Result<Self, ConfigError> {
        let page = Url::parse(page)
            .map_err(|err| ConfigError::InvalidUrl { url: page.to_string(), reason: err.to_string() })?;
        if !matches!(page.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(page.scheme().to_string()));
        }
        if page.host_str().is_none() {
            return Err(ConfigError::MissingHost(page.to_string()));
        }
        Ok(Self { page })
    }

    /// The page URL.
    pub fn page(&self) -> &Url {
        &self.page
    }

    /// Bootstrap request URL: the page path with `q=config` as its only query.
    pub fn config_url(&self) -> Url {
        let mut url = self.page.clone();
        url.set_query(Some("q=config"));
        url.set_fragment(None);
        url
    }

    /// WebSocket URL for `socket_path`.
    ///
    /// `socket_path` is appended verbatim to the service root, the page path
    /// up to and including its last `/`.
    pub fn socket_url(&self, socket_path: &str) -> String {
        let scheme = if self.page.scheme() == "https" { "wss" } else { "ws" };
        let host = self.page.host_str().unwrap_or_default();
        let port = self.page.port().map(|port| format!(":{port}")).unwrap_or_default();
        let path = self.page.path();
        let service_root = &path[..path.rfind('/').map_or(0, |idx| idx + 1)];
        let query = self.page.query().map(|query| format!("?{query}")).unwrap_or_default();

        format!("{scheme}://{host}{port}{service_root}{socket_path}{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_url_replaces_query() {
        let endpoints = Endpoints::parse("http://example.com/term/?arg=1#top").unwrap();

        assert_eq!(endpoints.config_url().as_str(), "http://example.com/term/?q=config");
    }

    #[test]
    fn socket_url_uses_service_root() {
        let endpoints = Endpoints::parse("http://example.com:8080/svc/index.html").unwrap();

        assert_eq!(endpoints.socket_url("ws"), "ws://example.com:8080/svc/ws");
    }

    #[test]
    fn socket_url_keeps_page_query_and_tls() {
        let endpoints = Endpoints::parse("https://example.com/term/?arg=ls&arg=-l").unwrap();

        assert_eq!(endpoints.socket_url("ws"), "wss://example.com/term/ws?arg=ls&arg=-l");
    }

    #[test]
    fn socket_path_is_appended_verbatim() {
        let endpoints = Endpoints::parse("http://example.com/").unwrap();

        assert_eq!(endpoints.socket_url("/ws/1"), "ws://example.com//ws/1");
    }

    #[test]
    fn rejects_non_http_pages() {
        assert_eq!(
            Endpoints::parse("ftp://example.com/"),
            Err(ConfigError::UnsupportedScheme("ftp".into()))
        );
        assert!(matches!(Endpoints::parse("not a url"), Err(ConfigError::InvalidUrl { .. })));
    }
}
