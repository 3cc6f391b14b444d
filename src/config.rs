use crate::{BlobFsError, BlobFsResult};

/// Default part size for incremental uploads (16 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Smallest part size the backend accepts for a non-final part (5 MiB)
pub const MIN_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Largest part size this driver will buffer in memory (100 MiB)
pub const MAX_CHUNK_SIZE: usize = 100 * 1024 * 1024;

/// Default hint for higher-level batching and parallelism
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

const MIN_CONCURRENCY: usize = 1;

/// Configuration for one driver instance.
///
/// Built once, validated before any network call, and immutable for the
/// instance's lifetime. Concurrent instances with different configurations
/// never interfere.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Backend credential id
    pub access_key_id: String,
    /// Backend credential secret
    pub secret_access_key: String,
    /// Backend endpoint region
    pub region: String,
    /// Target container
    pub bucket: String,
    /// Key prefix applied to every operation; empty means the bucket root
    pub root_directory: String,
    /// Part size for incremental uploads, bounded by
    /// [`MIN_CHUNK_SIZE`]..=[`MAX_CHUNK_SIZE`]
    pub chunk_size: usize,
    /// Caller-visible parallelism hint; not enforced inside the driver
    pub max_concurrency: usize,
    /// Use the encrypted endpoint scheme
    pub secure: bool,
    /// Diagnostic escape hatch for self-signed test endpoints
    pub skip_cert_verify: bool,
    /// Custom S3-compatible endpoint; derived from the region when absent
    pub endpoint: Option<String>,
}

impl DriverConfig {
    /// Create a configuration with the required parameters and defaults
    /// for everything else
    pub fn new<S: Into<String>>(access_key_id: S, secret_access_key: S, region: S, bucket: S) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
            bucket: bucket.into(),
            root_directory: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            secure: true,
            skip_cert_verify: false,
            endpoint: None,
        }
    }

    /// Set the root directory prefix
    pub fn with_root_directory<S: Into<String>>(mut self, root: S) -> Self {
        self.root_directory = root.into();
        self
    }

    /// Set the incremental upload part size
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the parallelism hint for higher-level operations
    pub fn with_max_concurrency(mut self, concurrency: usize) -> Self {
        self.max_concurrency = concurrency;
        self
    }

    /// Use the plaintext endpoint scheme
    pub fn insecure(mut self) -> Self {
        self.secure = false;
        self
    }

    /// Skip TLS certificate verification (testing only)
    pub fn with_skip_cert_verify(mut self) -> Self {
        self.skip_cert_verify = true;
        self
    }

    /// Point the driver at a custom S3-compatible endpoint
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Reject missing required parameters and out-of-range values.
    ///
    /// Runs before any network activity; a configuration that fails here
    /// never reaches the backend.
    pub fn validate(&self) -> BlobFsResult<()> {
        if self.access_key_id.is_empty() {
            return Err(BlobFsError::invalid_config("no access_key_id parameter provided"));
        }
        if self.secret_access_key.is_empty() {
            return Err(BlobFsError::invalid_config("no secret_access_key parameter provided"));
        }
        if self.region.is_empty() {
            return Err(BlobFsError::invalid_config("no region parameter provided"));
        }
        if self.bucket.is_empty() {
            return Err(BlobFsError::invalid_config("no bucket parameter provided"));
        }
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(BlobFsError::invalid_config(format!(
                "chunk_size {} must be at least {}",
                self.chunk_size, MIN_CHUNK_SIZE
            )));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(BlobFsError::invalid_config(format!(
                "chunk_size {} must be at most {}",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.max_concurrency < MIN_CONCURRENCY {
            return Err(BlobFsError::invalid_config(format!(
                "max_concurrency {} must be at least {}",
                self.max_concurrency, MIN_CONCURRENCY
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DriverConfig {
        DriverConfig::new("id", "secret", "region", "bucket")
    }

    #[test]
    fn accepts_defaults() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_missing_required_parameters() {
        let cases = [
            (DriverConfig::new("", "secret", "region", "bucket"), "access_key_id"),
            (DriverConfig::new("id", "", "region", "bucket"), "secret_access_key"),
            (DriverConfig::new("id", "secret", "", "bucket"), "region"),
            (DriverConfig::new("id", "secret", "region", ""), "bucket"),
        ];
        for (config, field) in cases {
            let err = config.validate().unwrap_err();
            assert!(
                err.to_string().contains(field),
                "expected {field} in {err}"
            );
        }
    }

    #[test]
    fn rejects_chunk_size_out_of_bounds() {
        let err = base().with_chunk_size(MIN_CHUNK_SIZE - 1).validate().unwrap_err();
        assert!(err.to_string().contains("at least"));

        let err = base().with_chunk_size(MAX_CHUNK_SIZE + 1).validate().unwrap_err();
        assert!(err.to_string().contains("at most"));

        assert!(base().with_chunk_size(MIN_CHUNK_SIZE).validate().is_ok());
        assert!(base().with_chunk_size(MAX_CHUNK_SIZE).validate().is_ok());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = base().with_max_concurrency(0).validate().unwrap_err();
        assert!(matches!(err, BlobFsError::InvalidConfig { .. }));
    }
}
