//! AWS Signature Version 4 request signing (header form)
//!
//! Only what the S3 store sends is supported: path-style requests whose
//! canonical URI and query are built here and reused verbatim for the
//! outgoing URL, so the signed and sent forms cannot drift apart.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// SHA-256 of an empty body
pub(crate) const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Credentials and scope used to sign requests
#[derive(Clone)]
pub(crate) struct Signer {
    access_key: String,
    secret_key: String,
    region: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// The parts of a request that go into the signature
pub(crate) struct CanonicalRequest<'a> {
    pub method: &'a str,
    /// Already URI-encoded path, see [`encode_path`]
    pub path: &'a str,
    /// Already canonical query string, see [`canonical_query`]
    pub query: &'a str,
    /// Lowercase header names to trimmed values; must include `host`
    pub headers: &'a BTreeMap<String, String>,
    pub payload_sha256: &'a str,
}

impl Signer {
    pub fn new(access_key: &str, secret_key: &str, region: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            region: region.to_string(),
        }
    }

    /// Build the `Authorization` header value for `request` at time `now`
    ///
    /// `now` must be the same instant sent in the `x-amz-date` header.
    pub fn authorization(&self, request: &CanonicalRequest<'_>, now: DateTime<Utc>) -> String {
        let date = now.format("%Y%m%d").to_string();
        let amz_date = amz_date(now);
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);

        let mut canonical_headers = String::new();
        for (name, value) in request.headers {
            let _ = writeln!(canonical_headers, "{}:{}", name, value.trim());
        }
        let signed_headers = request
            .headers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method,
            request.path,
            request.query,
            canonical_headers,
            signed_headers,
            request.payload_sha256
        );

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let k_date = hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.access_key, scope, signed_headers, signature
        )
    }
}

/// Timestamp in the `x-amz-date` format
pub(crate) fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Hex-encoded SHA-256 of `data`
pub(crate) fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn encode_into(out: &mut String, value: &str, keep_slash: bool) {
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if keep_slash => out.push('/'),
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
}

/// URI-encode a path, keeping `/` separators
pub(crate) fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() * 3);
    encode_into(&mut out, path, true);
    out
}

/// Canonical query string: encoded pairs sorted by name
pub(crate) fn canonical_query(params: &BTreeMap<&str, String>) -> String {
    let mut out = String::new();
    for (i, (name, value)) in params.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        encode_into(&mut out, name, false);
        out.push('=');
        encode_into(&mut out, value, false);
    }
    out
}
