//! S3-compatible object store
//!
//! Talks to any service that speaks the S3 REST API (Cloudflare R2, MinIO,
//! AWS) using path-style addressing and SigV4 header signing. Only the two
//! calls the catalog needs are implemented: ListObjectsV2 (followed across
//! continuation tokens) and PutObject with a canned ACL.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::sigv4::{self, CanonicalRequest, Signer};
use super::{ObjectEntry, ObjectStore, Visibility};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// Upper bound on ListObjectsV2 pages followed in one enumeration
const MAX_LIST_PAGES: usize = 10_000;

/// Object store backed by an S3-compatible HTTP API
pub struct S3Store {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
    signer: Signer,
}

/// ListObjectsV2 response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<ListedObject>,

    #[serde(default)]
    is_truncated: bool,

    #[serde(default)]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedObject {
    key: String,

    #[serde(default)]
    size: Option<u64>,

    #[serde(default)]
    last_modified: Option<String>,
}

impl From<ListedObject> for ObjectEntry {
    fn from(object: ListedObject) -> Self {
        ObjectEntry {
            key: object.key,
            size: object.size,
            last_modified: object.last_modified,
        }
    }
}

fn transport(operation: &'static str) -> impl FnOnce(reqwest::Error) -> StoreError {
    move |e| StoreError::Transport {
        operation,
        source: Box::new(e),
    }
}

impl S3Store {
    /// Create a store from validated configuration
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| StoreError::Malformed {
            operation: "client setup",
            message: format!("invalid endpoint {}: {}", config.endpoint, e),
        })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("kmf-station/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(transport("client setup"))?;

        info!(
            "Initializing S3 store (endpoint: {}, bucket: {}, region: {})",
            endpoint, config.bucket, config.region
        );

        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            signer: Signer::new(
                &config.access_key_id,
                &config.secret_access_key,
                &config.region,
            ),
        })
    }

    /// Encoded path-style path for `key` (or the bucket itself when `None`)
    fn object_path(&self, key: Option<&str>) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        let raw = match key {
            Some(key) => format!("{}/{}/{}", base, self.bucket, key),
            None => format!("{}/{}", base, self.bucket),
        };
        sigv4::encode_path(&raw)
    }

    /// `host[:port]` exactly as reqwest will send it
    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Build and send a signed request
    async fn send_signed(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        query: &str,
        extra_headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<reqwest::Response, StoreError> {
        let now = Utc::now();
        let payload_sha256 = if body.is_empty() {
            sigv4::EMPTY_PAYLOAD_SHA256.to_string()
        } else {
            sigv4::hex_sha256(&body)
        };

        let mut signed = BTreeMap::new();
        signed.insert("host".to_string(), self.host_header());
        signed.insert("x-amz-content-sha256".to_string(), payload_sha256.clone());
        signed.insert("x-amz-date".to_string(), sigv4::amz_date(now));
        for (name, value) in extra_headers {
            signed.insert(name.to_ascii_lowercase(), value.to_string());
        }

        let authorization = self.signer.authorization(
            &CanonicalRequest {
                method: method.as_str(),
                path,
                query,
                headers: &signed,
                payload_sha256: &payload_sha256,
            },
            now,
        );

        let mut url = self.endpoint.clone();
        url.set_path(path);
        url.set_query((!query.is_empty()).then_some(query));

        let mut headers = HeaderMap::new();
        for (name, value) in signed.iter().filter(|(name, _)| name.as_str() != "host") {
            headers.insert(header_name(operation, name)?, header_value(operation, value)?);
        }
        headers.insert(AUTHORIZATION, header_value(operation, &authorization)?);

        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(transport(operation))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("S3 {} failed: HTTP {} - {}", operation, status, body);
            return Err(StoreError::Status {
                operation,
                status,
                body,
            });
        }

        Ok(response)
    }

    /// Fetch one ListObjectsV2 page
    async fn list_page(&self, continuation: Option<&str>) -> Result<ListBucketResult, StoreError> {
        const OPERATION: &str = "ListObjectsV2";

        let mut params = BTreeMap::new();
        params.insert("list-type", "2".to_string());
        if let Some(token) = continuation {
            params.insert("continuation-token", token.to_string());
        }
        let query = sigv4::canonical_query(&params);

        let response = self
            .send_signed(
                OPERATION,
                Method::GET,
                &self.object_path(None),
                &query,
                &[],
                Vec::new(),
            )
            .await?;

        let xml = response.text().await.map_err(transport(OPERATION))?;
        parse_list_result(&xml)
    }
}

fn header_name(operation: &'static str, name: &str) -> Result<HeaderName, StoreError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| StoreError::Malformed {
        operation,
        message: format!("invalid header name {name}: {e}"),
    })
}

fn header_value(operation: &'static str, value: &str) -> Result<HeaderValue, StoreError> {
    HeaderValue::from_str(value).map_err(|e| StoreError::Malformed {
        operation,
        message: format!("invalid header value: {e}"),
    })
}

/// Follow continuation tokens until a page reports it is the last one
///
/// Running out of pages before that is an error: a partial listing must
/// never be handed out as the full bucket.
async fn collect_pages<F, Fut>(
    max_pages: usize,
    mut fetch: F,
) -> Result<Vec<ObjectEntry>, StoreError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListBucketResult, StoreError>>,
{
    let mut entries = Vec::new();
    let mut continuation: Option<String> = None;

    for page in 0..max_pages {
        let result = fetch(continuation.take()).await?;
        debug!(
            "ListObjectsV2 page {} returned {} objects (truncated: {})",
            page,
            result.contents.len(),
            result.is_truncated
        );
        entries.extend(result.contents.into_iter().map(ObjectEntry::from));

        match (result.is_truncated, result.next_continuation_token) {
            (true, Some(token)) => continuation = Some(token),
            _ => return Ok(entries),
        }
    }

    Err(StoreError::Malformed {
        operation: "ListObjectsV2",
        message: format!(
            "listing still truncated after {} pages ({} objects)",
            max_pages,
            entries.len()
        ),
    })
}

fn parse_list_result(xml: &str) -> Result<ListBucketResult, StoreError> {
    quick_xml::de::from_str(xml).map_err(|e| StoreError::Malformed {
        operation: "ListObjectsV2",
        message: e.to_string(),
    })
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_all_objects(&self) -> Result<Vec<ObjectEntry>, StoreError> {
        collect_pages(MAX_LIST_PAGES, |continuation| async move {
            self.list_page(continuation.as_deref()).await
        })
        .await
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        let size = body.len();

        self.send_signed(
            "PutObject",
            Method::PUT,
            &self.object_path(Some(key)),
            "",
            &[("x-amz-acl", visibility.as_acl())],
            body,
        )
        .await?;

        debug!("Stored {} ({} bytes, acl {})", key, size, visibility.as_acl());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}
