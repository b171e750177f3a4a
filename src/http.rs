//! HTTP transport, kept to the shape of a provider callback rather than
//! a concrete client. The core never assumes a particular client;
//! it only needs something that can issue a single blocking request and
//! hand back status, headers, and body.

use crate::error::{Error, Result};

/// A single signed HTTP request the core needs performed.
pub struct HttpRequest<'a> {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> HttpRequest<'a> {
    pub fn new(method: &'static str, url: String, headers: Vec<(&'static str, String)>) -> Self {
        Self {
            method,
            url,
            headers,
            _marker: std::marker::PhantomData,
        }
    }
}

/// The response the core needs back: status, headers (lower-cased
/// names), and the full body (range GETs are bounded to a page's worth
/// of bytes, so buffering in memory is fine).
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// External collaborator: a blocking HTTP client capable of a single
/// request/response round trip.
pub trait HttpClient: Send + Sync {
    fn request(&self, req: HttpRequest<'_>) -> Result<HttpResponse>;
}

/// Default client: a `reqwest::blocking::Client`. Adequate for the
/// single-threaded-per-session model the VFS requires — every VFS read
/// callback blocks the calling thread for the duration of the request
/// anyway, so there is nothing to gain from an async client here.
pub struct ReqwestBlockingClient {
    inner: reqwest::blocking::Client,
}

impl ReqwestBlockingClient {
    pub fn new() -> Result<Self> {
        let inner = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Build a client bounding the time spent establishing the TCP/TLS
    /// connection to `connect_timeout` — the knob [`SessionOptions`]
    /// exposes for the default HTTP client (the Python original hardcodes
    /// no such timeout at all; a reusable Rust crate should).
    ///
    /// [`SessionOptions`]: crate::session::SessionOptions
    pub fn with_connect_timeout(connect_timeout: std::time::Duration) -> Result<Self> {
        let inner = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl Default for ReqwestBlockingClient {
    fn default() -> Self {
        Self::new().expect("failed to construct default reqwest client")
    }
}

impl HttpClient for ReqwestBlockingClient {
    fn request(&self, req: HttpRequest<'_>) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(req.method.as_bytes())
            .map_err(|e| Error::Transport(e.to_string()))?;

        let mut builder = self.inner.request(method, &req.url);
        for (name, value) in &req.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder
            .send()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| Error::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
