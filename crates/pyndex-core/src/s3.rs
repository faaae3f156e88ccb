//! S3 client settings, and the runtime the blocking backends run on.
//!
//! Both S3 backends go through `object_store`, which signs requests and
//! resolves credentials. The index workflows stay synchronous. Each one is a
//! sequential critical section, so requests are driven to completion on a
//! shared runtime.

use std::fmt;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use object_store::ClientOptions;
use object_store::aws::{AmazonS3, AmazonS3Builder, S3ConditionalPut};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::BackendError;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout (large distribution uploads included)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Shared tokio runtime for S3 operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Run a future to completion on the shared runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    SHARED_RUNTIME.block_on(future)
}

/// Connection and credential settings shared by every bucket a command
/// touches (the index bucket and its lock table).
///
/// Unset fields fall back to the `AWS_*` environment variables. If those are
/// unset too, the instance or container credential chain is used.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct S3Config {
    pub region: Option<String>,
    /// Custom endpoint (MinIO, R2, ...); `None` targets AWS.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Send anonymous requests.
    pub unsigned: bool,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .field("unsigned", &self.unsigned)
            .finish()
    }
}

impl S3Config {
    /// Client for `bucket`.
    pub fn client(&self, bucket: &str) -> Result<AmazonS3, BackendError> {
        self.client_with_headers(bucket, &[])
    }

    /// Client for `bucket` that adds `headers` to every request it sends.
    pub fn client_with_headers(
        &self,
        bucket: &str,
        headers: &[(String, String)],
    ) -> Result<AmazonS3, BackendError> {
        Ok(self.builder(bucket, headers)?.build()?)
    }

    fn builder(
        &self,
        bucket: &str,
        headers: &[(String, String)],
    ) -> Result<AmazonS3Builder, BackendError> {
        let mut options = ClientOptions::new()
            .with_connect_timeout(CONNECT_TIMEOUT)
            .with_timeout(REQUEST_TIMEOUT);
        if !headers.is_empty() {
            options = options.with_default_headers(header_map(headers)?);
        }

        // Client options replace the whole set, so allow_http comes after.
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_client_options(options)
            .with_conditional_put(S3ConditionalPut::ETagMatch)
            .with_skip_signature(self.unsigned);
        if let Some(region) = &self.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(key) = &self.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &self.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(token) = &self.session_token {
            builder = builder.with_token(token);
        }
        Ok(builder)
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, BackendError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| BackendError::Config(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| BackendError::Config(format!("header {name}: {e}")))?;
        map.insert(header, value);
    }
    Ok(map)
}
