//! Range Reader (§4.C): turns a pinned [`ObjectBinding`] plus an
//! `(offset, length)` pair into exactly those bytes, via a signed range
//! GET. Every call is independent — no connection or byte-range cache is
//! kept across calls, since the VFS page cache above it already absorbs
//! repeat reads of the same page within a session.

use tracing::{instrument, trace};

use crate::binding::ObjectBinding;
use crate::credentials::CredentialsProvider;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpRequest};
use crate::signer::Signer;

/// Issues signed range GETs against one pinned object version.
pub struct RangeReader<'a> {
    binding: &'a ObjectBinding,
    http: &'a dyn HttpClient,
    credentials: &'a dyn CredentialsProvider,
}

impl<'a> RangeReader<'a> {
    pub fn new(
        binding: &'a ObjectBinding,
        http: &'a dyn HttpClient,
        credentials: &'a dyn CredentialsProvider,
    ) -> Self {
        Self {
            binding,
            http,
            credentials,
        }
    }

    /// Read `len` bytes starting at `offset`, requiring HTTP 206 and an
    /// exact byte-range match. Returns fewer than `len` bytes only when
    /// `offset + len` runs past the object's pinned length — callers
    /// (the VFS `xRead` callback) are responsible for zero-filling the
    /// remainder and reporting a short read.
    #[instrument(skip(self), fields(offset, len))]
    pub fn read_range(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let last = offset + len - 1;
        let range_header = format!("bytes={}-{}", offset, last);

        let creds = self.credentials.credentials()?;
        let signer = Signer::new(self.binding.region.clone());
        let now = chrono::Utc::now();
        let query = [("versionId", self.binding.version_id.as_str())];
        let signed = signer.sign(
            "GET",
            &self.binding.host,
            &self.binding.path,
            &query,
            &creds,
            now,
        );

        let mut headers = vec![
            ("Host", self.binding.host.clone()),
            ("Range", range_header),
        ];
        headers.extend(signed.headers);

        let url = format!(
            "{}://{}{}?versionId={}",
            self.binding.scheme,
            self.binding.host,
            self.binding.path,
            percent_encode(&self.binding.version_id)
        );

        let response = self
            .http
            .request(HttpRequest::new("GET", url.clone(), headers))?;

        if response.status != 206 {
            return Err(Error::http_status("GET", url, response.status));
        }

        let returned_version = response.header("x-amz-version-id");
        if let Some(v) = returned_version {
            if v != self.binding.version_id {
                return Err(Error::Transport(format!(
                    "object version changed mid-session: pinned {} but range GET returned {}",
                    self.binding.version_id, v
                )));
            }
        }

        trace!(bytes = response.body.len(), "range read complete");

        Ok(response.body)
    }
}

fn percent_encode(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for b in v.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
