//! Client configuration.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Error, Result};
use crate::options::OptionWhitelist;
use crate::version::VersionRange;

/// Tag wrapping every request and response document.
pub const DEFAULT_ENVELOPE: &str = "prestashop";

/// Response header carrying the server version.
pub const VERSION_HEADER: &str = "psws-version";

pub const DEFAULT_USER_AGENT: &str = "prestaws: Rust PrestaShop Library";

/// How XML request bodies are put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// `xml=<document>` as `application/x-www-form-urlencoded`.
    #[default]
    FormField,
    /// The document itself as `text/xml`.
    Xml,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_url: String,
    api_key: String,
    debug: bool,
    headers: Vec<(String, String)>,
    envelope: String,
    options: OptionWhitelist,
    versions: VersionRange,
    body_encoding: BodyEncoding,
}

impl ClientConfig {
    /// `api_url` may be the shop root or its `/api` endpoint.
    pub fn new(api_url: &str, api_key: &str) -> Self {
        Self {
            api_url: normalize_api_url(api_url),
            api_key: api_key.to_string(),
            debug: false,
            headers: vec![("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string())],
            envelope: DEFAULT_ENVELOPE.to_string(),
            options: OptionWhitelist::default(),
            versions: VersionRange::default(),
            body_encoding: BodyEncoding::default(),
        }
    }

    /// Read `PRESTASHOP_API_URL`, `PRESTASHOP_API_KEY` and the optional
    /// `PRESTASHOP_DEBUG` (`1` or `true`).
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("PRESTASHOP_API_URL")
            .map_err(|_| Error::Config("PRESTASHOP_API_URL is not set".to_string()))?;
        let api_key = std::env::var("PRESTASHOP_API_KEY")
            .map_err(|_| Error::Config("PRESTASHOP_API_KEY is not set".to_string()))?;
        let debug = std::env::var("PRESTASHOP_DEBUG")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
            .unwrap_or(false);
        Ok(Self::new(&api_url, &api_key).with_debug(debug))
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Add a header sent with every request, replacing one of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_envelope(mut self, envelope: impl Into<String>) -> Self {
        self.envelope = envelope.into();
        self
    }

    pub fn with_option_whitelist(mut self, options: OptionWhitelist) -> Self {
        self.options = options;
        self
    }

    pub fn with_version_range(mut self, versions: VersionRange) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_body_encoding(mut self, body_encoding: BodyEncoding) -> Self {
        self.body_encoding = body_encoding;
        self
    }

    /// Normalized endpoint, always ending in `/api/`.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn envelope(&self) -> &str {
        &self.envelope
    }

    pub fn option_whitelist(&self) -> &OptionWhitelist {
        &self.options
    }

    pub fn version_range(&self) -> &VersionRange {
        &self.versions
    }

    pub fn body_encoding(&self) -> BodyEncoding {
        self.body_encoding
    }

    /// `Authorization` header value: the key as basic-auth user, no password.
    pub fn authorization(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:", self.api_key)))
    }
}

fn normalize_api_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with("/api") {
        format!("{trimmed}/")
    } else {
        format!("{trimmed}/api/")
    }
}
