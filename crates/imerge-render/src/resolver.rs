//! Resource resolution: turning an image reference into something the
//! decoder can read without further I/O.
//!
//! Network references are fetched and inlined as base64 data URIs. Anything
//! else is handed back unchanged and left to the decoder.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use imerge_core::data_uri::abbreviate;
use imerge_core::{DataUri, MergeConfig, MergeError, MergeResult};

const FALLBACK_MIME: &str = "application/octet-stream";

#[async_trait]
pub trait ResourceResolver: Send + Sync {
    /// Resolve `reference` to an embeddable form. Failures are load errors
    /// scoped to this one reference.
    async fn resolve(&self, reference: &str) -> MergeResult<String>;
}

/// True for `http://` and `https://` references (scheme is case-insensitive).
pub fn is_network_reference(reference: &str) -> bool {
    has_prefix_ignore_case(reference, "http://") || has_prefix_ignore_case(reference, "https://")
}

/// Rewrite a leading `http://` to `https://`. Other references are borrowed
/// back untouched.
pub fn upgrade_scheme(reference: &str) -> Cow<'_, str> {
    if has_prefix_ignore_case(reference, "http://") {
        Cow::Owned(format!("https://{}", &reference["http://".len()..]))
    } else {
        Cow::Borrowed(reference)
    }
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Guess a media type from the path component of a reference.
fn guess_mime(reference: &str) -> String {
    let no_frag = reference.split('#').next().unwrap_or(reference);
    let no_query = no_frag.split('?').next().unwrap_or(no_frag);
    mime_guess::from_path(no_query)
        .first_raw()
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

/// Fetches network references over HTTP(S).
pub struct HttpResolver {
    client: Client,
    upgrade_insecure: bool,
}

impl HttpResolver {
    pub fn new(config: &MergeConfig) -> MergeResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.fetch_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| MergeError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config.upgrade_insecure))
    }

    /// Use a preconfigured client (proxies, TLS roots, headers).
    pub fn with_client(client: Client, upgrade_insecure: bool) -> Self {
        Self {
            client,
            upgrade_insecure,
        }
    }

    /// The URL that will actually be requested for `reference`.
    pub fn request_url<'a>(&self, reference: &'a str) -> Cow<'a, str> {
        if self.upgrade_insecure {
            upgrade_scheme(reference)
        } else {
            Cow::Borrowed(reference)
        }
    }
}

#[async_trait]
impl ResourceResolver for HttpResolver {
    async fn resolve(&self, reference: &str) -> MergeResult<String> {
        if !is_network_reference(reference) {
            return Ok(reference.to_string());
        }

        let url = self.request_url(reference);
        tracing::debug!("Fetching {}", url);

        let res = self
            .client
            .get(url.as_ref())
            .send()
            .await
            .map_err(|e| MergeError::fetch(url.as_ref(), format!("request failed: {}", e)))?;

        if !res.status().is_success() {
            return Err(MergeError::fetch(
                url.as_ref(),
                format!("unexpected status {}", res.status()),
            ));
        }

        let mime = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| guess_mime(&url));

        let bytes = res
            .bytes()
            .await
            .map_err(|e| MergeError::fetch(url.as_ref(), format!("failed to read body: {}", e)))?;

        tracing::debug!("Fetched {} ({} bytes, {})", url, bytes.len(), mime);
        Ok(DataUri::new(mime, bytes.to_vec()).to_string())
    }
}

/// Serves references from memory, for hosts that already hold the image
/// bytes. Unknown references pass through unchanged.
#[derive(Default)]
pub struct StaticResolver {
    entries: HashMap<String, Entry>,
}

enum Entry {
    Inline(String),
    Unavailable(String),
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes for a reference; the media type is guessed from the
    /// reference's extension.
    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        let reference = reference.into();
        let mime = guess_mime(&reference);
        self.insert_with_mime(reference, mime, bytes);
    }

    pub fn insert_with_mime(
        &mut self,
        reference: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) {
        let uri = DataUri::new(mime, bytes).to_string();
        self.entries.insert(reference.into(), Entry::Inline(uri));
    }

    /// Make `reference` fail to resolve with a fetch error.
    pub fn insert_unavailable(&mut self, reference: impl Into<String>, message: impl Into<String>) {
        self.entries
            .insert(reference.into(), Entry::Unavailable(message.into()));
    }

    pub fn with(mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(reference, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResourceResolver for StaticResolver {
    async fn resolve(&self, reference: &str) -> MergeResult<String> {
        match self.entries.get(reference) {
            Some(Entry::Inline(uri)) => Ok(uri.clone()),
            Some(Entry::Unavailable(message)) => {
                Err(MergeError::fetch(abbreviate(reference), message.clone()))
            }
            None => Ok(reference.to_string()),
        }
    }
}
