//! Object Binding (§4.B): resolves a URL to an immutable
//! `(host, path, region, version id, length)` tuple at session open, and
//! never renegotiates it.

use tracing::{debug, instrument};

use crate::credentials::CredentialsProvider;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpRequest};
use crate::signer::Signer;

/// Resolved, immutable for the life of a session.
#[derive(Clone, Debug)]
pub struct ObjectBinding {
    pub scheme: &'static str,
    pub host: String,
    pub path: String,
    pub region: String,
    pub service: &'static str,
    pub version_id: String,
    pub length: u64,
}

impl ObjectBinding {
    /// Full URL of the pinned version, with `versionId` participating in
    /// the canonical query string exactly as it will for every
    /// subsequent range GET.
    pub fn versioned_url(&self) -> String {
        format!(
            "{}://{}{}?versionId={}",
            self.scheme,
            self.host,
            self.path,
            urlencode_value(&self.version_id)
        )
    }
}

fn urlencode_value(v: &str) -> String {
    // versionId values are opaque tokens from S3; percent-encode
    // defensively in case a compatible store ever emits reserved chars.
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

/// Resolve the object at `url` (`https://host/path`) by issuing a signed
/// HEAD, requiring HTTP 200 and a non-null `x-amz-version-id`.
#[instrument(skip(http, credentials))]
pub fn resolve(
    url: &str,
    http: &dyn HttpClient,
    credentials: &dyn CredentialsProvider,
) -> Result<ObjectBinding> {
    let parsed = url::Url::parse(url).map_err(|e| Error::Transport(e.to_string()))?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(Error::Transport(format!(
            "unsupported URL scheme `{}`",
            parsed.scheme()
        )));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Transport("URL has no host".to_string()))?
        .to_string();
    let host = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };
    let path = if parsed.path().is_empty() {
        "/".to_string()
    } else {
        parsed.path().to_string()
    };

    let creds = credentials.credentials()?;
    let signer = Signer::new(creds.region.clone());
    let now = chrono::Utc::now();
    let signed = signer.sign("HEAD", &host, &path, &[], &creds, now);

    let scheme: &'static str = if parsed.scheme() == "http" {
        "http"
    } else {
        "https"
    };
    let mut headers = vec![("Host", host.clone())];
    headers.extend(signed.headers);

    let request_url = format!("{}://{}{}", scheme, host, path);
    let response = http.request(HttpRequest::new("HEAD", request_url.clone(), headers))?;

    if response.status != 200 {
        return Err(Error::http_status("HEAD", request_url, response.status));
    }

    let version_id = response
        .header("x-amz-version-id")
        .filter(|v| *v != "null")
        .ok_or(Error::VersioningNotEnabled)?
        .to_string();

    let length: u64 = response
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::Transport("HEAD response missing Content-Length".to_string()))?;

    debug!(version_id, length, "resolved object binding");

    Ok(ObjectBinding {
        scheme,
        host,
        path,
        region: creds.region,
        service: "s3",
        version_id,
        length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialsProvider;
    use std::sync::Mutex;

    struct FakeHttp {
        responses: Mutex<Vec<crate::http::HttpResponse>>,
    }

    impl HttpClient for FakeHttp {
        fn request(&self, _req: HttpRequest<'_>) -> Result<crate::http::HttpResponse> {
            let mut responses = self.responses.lock().unwrap();
            Ok(responses.remove(0))
        }
    }

    fn creds() -> StaticCredentialsProvider {
        StaticCredentialsProvider::new("us-east-1", "AKID", "SECRET", None)
    }

    #[test]
    fn resolve_extracts_version_and_length() {
        let http = FakeHttp {
            responses: Mutex::new(vec![crate::http::HttpResponse {
                status: 200,
                headers: vec![
                    ("x-amz-version-id".to_string(), "v1".to_string()),
                    ("content-length".to_string(), "4096".to_string()),
                ],
                body: vec![],
            }]),
        };
        let binding = resolve("https://bucket.s3.amazonaws.com/db.sqlite3", &http, &creds())
            .unwrap();
        assert_eq!(binding.version_id, "v1");
        assert_eq!(binding.length, 4096);
        assert_eq!(binding.host, "bucket.s3.amazonaws.com");
        assert_eq!(binding.path, "/db.sqlite3");
    }

    #[test]
    fn resolve_rejects_null_version_id() {
        let http = FakeHttp {
            responses: Mutex::new(vec![crate::http::HttpResponse {
                status: 200,
                headers: vec![
                    ("x-amz-version-id".to_string(), "null".to_string()),
                    ("content-length".to_string(), "10".to_string()),
                ],
                body: vec![],
            }]),
        };
        let err = resolve("https://bucket.s3.amazonaws.com/db.sqlite3", &http, &creds())
            .unwrap_err();
        assert!(matches!(err, Error::VersioningNotEnabled));
    }

    #[test]
    fn resolve_rejects_missing_version_id_header() {
        let http = FakeHttp {
            responses: Mutex::new(vec![crate::http::HttpResponse {
                status: 200,
                headers: vec![("content-length".to_string(), "10".to_string())],
                body: vec![],
            }]),
        };
        let err = resolve("https://bucket.s3.amazonaws.com/db.sqlite3", &http, &creds())
            .unwrap_err();
        assert!(matches!(err, Error::VersioningNotEnabled));
    }

    #[test]
    fn resolve_rejects_non_200() {
        let http = FakeHttp {
            responses: Mutex::new(vec![crate::http::HttpResponse {
                status: 403,
                headers: vec![],
                body: vec![],
            }]),
        };
        let err = resolve("https://bucket.s3.amazonaws.com/db.sqlite3", &http, &creds())
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 403, .. }));
    }
}
