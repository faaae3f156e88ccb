//! Object store on S3 (or an S3-compatible service) through `object_store`.
//!
//! Object paths cannot end in `/`, so a directory marker key (`foo/`, or `/`
//! for the root) is stored as the `index.html` object of that directory, the
//! same layout the filesystem backend writes. S3 website hosting then serves
//! `foo/` from the same object.

use std::path::Path;
use std::sync::Arc;

use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore as _, PutPayload};
use tokio::io::AsyncWriteExt;

use pyndex_core::s3::block_on;
use pyndex_core::{BackendError, INDEX_HTML, S3Config};

use crate::object::{ObjectStore, PutOptions};

/// Request headers for a canned ACL and a storage class.
pub fn put_headers(acl: Option<&str>, storage_class: Option<&str>) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if let Some(acl) = acl {
        headers.push(("x-amz-acl".to_string(), acl.to_string()));
    }
    if let Some(class) = storage_class {
        headers.push(("x-amz-storage-class".to_string(), class.to_string()));
    }
    headers
}

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    bucket: String,
    client: Arc<dyn object_store::ObjectStore>,
    /// Client used for writes; it also carries the extra PUT headers.
    writer: Arc<dyn object_store::ObjectStore>,
}

impl S3ObjectStore {
    /// Store for `bucket`. `put_headers` are sent with every write.
    pub fn new(
        config: &S3Config,
        bucket: &str,
        put_headers: &[(String, String)],
    ) -> Result<Self, BackendError> {
        let client: Arc<dyn object_store::ObjectStore> = Arc::new(config.client(bucket)?);
        let writer: Arc<dyn object_store::ObjectStore> = if put_headers.is_empty() {
            client.clone()
        } else {
            Arc::new(config.client_with_headers(bucket, put_headers)?)
        };
        Ok(Self {
            bucket: bucket.to_string(),
            client,
            writer,
        })
    }

    /// Store over an already-built client for `bucket`.
    pub fn with_client(bucket: &str, client: Arc<dyn object_store::ObjectStore>) -> Self {
        Self {
            bucket: bucket.to_string(),
            writer: client.clone(),
            client,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn object_path(key: &str) -> ObjectPath {
    if key.is_empty() || key.ends_with('/') {
        ObjectPath::from(format!("{key}{INDEX_HTML}"))
    } else {
        ObjectPath::from(key)
    }
}

fn attributes(opts: &PutOptions) -> Attributes {
    let mut attributes = Attributes::new();
    if let Some(content_type) = &opts.content_type {
        attributes.insert(Attribute::ContentType, content_type.clone().into());
    }
    if let Some(cache_control) = &opts.cache_control {
        attributes.insert(Attribute::CacheControl, cache_control.clone().into());
    }
    attributes
}

/// Report a missing object under the key the caller asked for.
fn store_error(key: &str, e: object_store::Error) -> BackendError {
    match e {
        object_store::Error::NotFound { .. } => BackendError::NotFound(key.to_string()),
        e => e.into(),
    }
}

impl ObjectStore for S3ObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, BackendError> {
        let path = object_path(key);
        block_on(async { self.client.get(&path).await?.bytes().await })
            .map(|body| body.to_vec())
            .map_err(|e| store_error(key, e))
    }

    fn put(&self, key: &str, body: &[u8], opts: &PutOptions) -> Result<(), BackendError> {
        let path = object_path(key);
        log::debug!("PUT s3://{}/{path} ({} bytes)", self.bucket, body.len());
        let put = object_store::PutOptions {
            attributes: attributes(opts),
            ..Default::default()
        };
        block_on(self.writer.put_opts(&path, PutPayload::from(body.to_vec()), put))?;
        Ok(())
    }

    /// Streams the file; large files go up as a multipart upload.
    fn put_file(&self, key: &str, src: &Path, opts: &PutOptions) -> Result<(), BackendError> {
        let path = object_path(key);
        log::debug!("PUT s3://{}/{path} from {}", self.bucket, src.display());
        let mut upload = BufWriter::new(self.writer.clone(), path).with_attributes(attributes(opts));
        block_on(async {
            let mut file = tokio::fs::File::open(src).await?;
            tokio::io::copy(&mut file, &mut upload).await?;
            upload.shutdown().await
        })?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        match block_on(self.client.delete(&object_path(key))) {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let base = (!prefix.trim_matches('/').is_empty()).then(|| ObjectPath::from(prefix));
        let listing = block_on(self.client.list_with_delimiter(base.as_ref()))?;
        let mut prefixes: Vec<String> = listing
            .common_prefixes
            .iter()
            .map(|p| format!("{p}/"))
            .collect();
        prefixes.sort();
        Ok(prefixes)
    }
}

#[cfg(test)]
mod tests {
    use object_store::ObjectStore as _;
    use object_store::memory::InMemory;

    use super::*;

    fn memory_store() -> (Arc<InMemory>, S3ObjectStore) {
        let memory = Arc::new(InMemory::new());
        let store = S3ObjectStore::with_client("pypi", memory.clone());
        (memory, store)
    }

    fn stored_attribute(memory: &InMemory, path: &str, attribute: &Attribute) -> Option<String> {
        let result = block_on(memory.get(&ObjectPath::from(path))).unwrap();
        result.attributes.get(attribute).map(|v| {
            let value: &str = v.as_ref();
            value.to_string()
        })
    }

    #[test]
    fn directory_markers_map_to_index_html() {
        assert_eq!(object_path("foo/").to_string(), "foo/index.html");
        assert_eq!(object_path("secret/foo/").to_string(), "secret/foo/index.html");
        assert_eq!(object_path("/").to_string(), "index.html");
        assert_eq!(object_path("").to_string(), "index.html");
        assert_eq!(object_path("foo/index.html").to_string(), "foo/index.html");
        assert_eq!(object_path("foo/foo-1.0.tar.gz").to_string(), "foo/foo-1.0.tar.gz");
    }

    #[test]
    fn acl_and_storage_class_headers() {
        assert!(put_headers(None, None).is_empty());
        assert_eq!(
            put_headers(Some("public-read"), Some("STANDARD_IA")),
            vec![
                ("x-amz-acl".to_string(), "public-read".to_string()),
                ("x-amz-storage-class".to_string(), "STANDARD_IA".to_string()),
            ]
        );
    }

    #[test]
    fn builds_from_config() {
        let config = S3Config {
            endpoint: Some("http://localhost:9000".to_string()),
            unsigned: true,
            ..Default::default()
        };
        let headers = put_headers(Some("private"), None);
        let store = S3ObjectStore::new(&config, "pypi", &headers).unwrap();
        assert_eq!(store.bucket(), "pypi");
    }

    #[test]
    fn put_get_with_metadata() {
        let (memory, store) = memory_store();
        let opts = PutOptions {
            content_type: Some("text/html".into()),
            cache_control: Some("max-age=0".into()),
        };
        store.put("foo/", b"<html>", &opts).unwrap();

        assert_eq!(store.get("foo/").unwrap(), b"<html>");
        assert_eq!(store.get("foo/index.html").unwrap(), b"<html>");
        assert_eq!(
            stored_attribute(&memory, "foo/index.html", &Attribute::ContentType).as_deref(),
            Some("text/html")
        );
        assert_eq!(
            stored_attribute(&memory, "foo/index.html", &Attribute::CacheControl).as_deref(),
            Some("max-age=0")
        );
    }

    #[test]
    fn get_missing_is_not_found_under_key() {
        let (_, store) = memory_store();
        match store.get("foo/").unwrap_err() {
            BackendError::NotFound(key) => assert_eq!(key, "foo/"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn put_file_streams_contents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("foo-1.0.tar.gz");
        std::fs::write(&src, vec![7u8; 100_000]).unwrap();

        let (memory, store) = memory_store();
        let opts = PutOptions {
            content_type: Some("application/x-gzip".into()),
            ..Default::default()
        };
        store.put_file("foo/foo-1.0.tar.gz", &src, &opts).unwrap();
        assert_eq!(store.get("foo/foo-1.0.tar.gz").unwrap(), vec![7u8; 100_000]);
        assert_eq!(
            stored_attribute(&memory, "foo/foo-1.0.tar.gz", &Attribute::ContentType).as_deref(),
            Some("application/x-gzip")
        );
    }

    #[test]
    fn delete_is_idempotent() {
        let (_, store) = memory_store();
        store.put("foo/a.whl", b"x", &PutOptions::default()).unwrap();
        store.delete("foo/a.whl").unwrap();
        store.delete("foo/a.whl").unwrap();
        assert!(store.get("foo/a.whl").unwrap_err().is_not_found());
    }

    #[test]
    fn list_prefixes_one_level() {
        let (_, store) = memory_store();
        let opts = PutOptions::default();
        store.put("/", b"root", &opts).unwrap();
        store.put("foo/", b"x", &opts).unwrap();
        store.put("bar/bar-1.0.tar.gz", b"x", &opts).unwrap();
        store.put("secret/baz/", b"x", &opts).unwrap();
        store.put("secret-other/qux/", b"x", &opts).unwrap();

        assert_eq!(
            store.list_prefixes("").unwrap(),
            vec!["bar/", "foo/", "secret-other/", "secret/"]
        );
        assert_eq!(store.list_prefixes("secret/").unwrap(), vec!["secret/baz/"]);
    }
}
