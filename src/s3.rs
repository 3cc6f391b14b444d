use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as SdkByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as SdkCompletedPart, Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    BatchFailure, BlobFsError, BlobFsResult, ByteStream, ClientCapabilities, CompletedPart,
    DriverConfig, ListPage, ListRequest, ObjectClient, ObjectHead, ObjectSummary,
};

const BATCH_DELETE_LIMIT: usize = 1000;

/// [`ObjectClient`] over any S3-compatible backend.
///
/// The SDK's transport retries are disabled: the driver surfaces transient
/// failures to the caller, which owns the retry policy.
pub struct S3ObjectClient {
    client: Client,
    bucket: String,
}

impl S3ObjectClient {
    /// Build a client from a validated configuration and verify bucket
    /// access before handing it out.
    pub async fn connect(config: &DriverConfig) -> BlobFsResult<Self> {
        config.validate()?;

        let scheme = if config.secure { "https" } else { "http" };
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("{}://s3.{}.amazonaws.com", scheme, config.region));

        if config.skip_cert_verify {
            // The bundled client always verifies certificates; deployments
            // that need the escape hatch inject their own ObjectClient.
            warn!("skip_cert_verify is set but the bundled S3 client keeps TLS verification on");
        }

        let credentials = Credentials::from_keys(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
        );
        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .force_path_style(config.endpoint.is_some())
            .retry_config(RetryConfig::disabled())
            .build();
        let client = Client::from_conf(sdk_config);

        if let Err(err) = client.head_bucket().bucket(&config.bucket).send().await {
            return Err(BlobFsError::invalid_config(format!(
                "unable to access bucket {} in region {}: {}",
                config.bucket,
                config.region,
                describe(&err)
            )));
        }

        debug!(bucket = %config.bucket, region = %config.region, "connected to backend");
        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    async fn get(&self, key: &str, offset: u64) -> BlobFsResult<ByteStream> {
        let range = (offset > 0).then(|| format!("bytes={}-", offset));
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range)
            .send()
            .await
            .map_err(|err| {
                if let SdkError::ServiceError(ref service_err) = err {
                    if service_err.err().is_no_such_key() {
                        return BlobFsError::not_found(key);
                    }
                }
                translate(key, &err)
            })?;

        let mut body = output.body;
        let stream = async_stream::stream! {
            while let Some(chunk) = body.next().await {
                yield chunk.map_err(|e| std::io::Error::other(e));
            }
        };
        Ok(Box::pin(stream))
    }

    async fn put(&self, key: &str, body: Bytes) -> BlobFsResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(SdkByteStream::from(body))
            .send()
            .await
            .map_err(|err| translate(key, &err))?;
        Ok(())
    }

    async fn head(&self, key: &str) -> BlobFsResult<ObjectHead> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if let SdkError::ServiceError(ref service_err) = err {
                    if service_err.err().is_not_found() {
                        return BlobFsError::not_found(key);
                    }
                }
                translate(key, &err)
            })?;

        Ok(ObjectHead {
            size: output.content_length.unwrap_or(0).max(0) as u64,
            last_modified: output.last_modified.and_then(to_chrono),
            etag: output.e_tag,
        })
    }

    async fn list(&self, request: ListRequest) -> BlobFsResult<ListPage> {
        let output = self
            .client
            .list_objects()
            .bucket(&self.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_marker(request.marker.clone())
            .max_keys(request.max_keys.min(i32::MAX as usize) as i32)
            .send()
            .await
            .map_err(|err| translate(&request.prefix, &err))?;

        let objects: Vec<ObjectSummary> = output
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|object| {
                let key = object.key?;
                Some(ObjectSummary {
                    key,
                    size: object.size.unwrap_or(0).max(0) as u64,
                    last_modified: object.last_modified.and_then(to_chrono),
                })
            })
            .collect();
        let common_prefixes: Vec<String> = output
            .common_prefixes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|cp| cp.prefix)
            .collect();

        let is_truncated = output.is_truncated.unwrap_or(false);
        // The backend only returns a next marker for delimited listings;
        // otherwise the last returned key resumes the chain.
        let next_marker = if is_truncated {
            output
                .next_marker
                .or_else(|| objects.last().map(|o| o.key.clone()))
        } else {
            None
        };

        Ok(ListPage {
            objects,
            common_prefixes,
            is_truncated,
            next_marker,
        })
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> BlobFsResult<()> {
        // The copy source is URL-encoded so keys with non-ASCII segments
        // survive the header round trip.
        let source = format!("{}/{}", self.bucket, urlencoding::encode(src_key));
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(dst_key)
            .copy_source(source)
            .send()
            .await
            .map_err(|err| translate(src_key, &err))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> BlobFsResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| translate(key, &err))?;
        Ok(())
    }

    async fn delete_batch(&self, keys: Vec<String>) -> BlobFsResult<Vec<BatchFailure>> {
        let identifiers = keys
            .into_iter()
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|e| BlobFsError::backend("InvalidRequest", e.to_string()))
            })
            .collect::<BlobFsResult<Vec<_>>>()?;
        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|e| BlobFsError::backend("InvalidRequest", e.to_string()))?;

        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|err| translate("", &err))?;

        Ok(output
            .errors
            .unwrap_or_default()
            .into_iter()
            .map(|e| BatchFailure {
                key: e.key.unwrap_or_default(),
                code: e.code.unwrap_or_default(),
                message: e.message.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_upload(&self, key: &str) -> BlobFsResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| translate(key, &err))?;
        output
            .upload_id
            .ok_or_else(|| BlobFsError::backend("MissingUploadId", key))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> BlobFsResult<String> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number as i32)
            .body(SdkByteStream::from(body))
            .send()
            .await
            .map_err(|err| translate(key, &err))?;
        output
            .e_tag
            .ok_or_else(|| BlobFsError::backend("MissingETag", key))
    }

    async fn complete_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> BlobFsResult<()> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|part| {
                        SdkCompletedPart::builder()
                            .part_number(part.part_number as i32)
                            .e_tag(part.etag.clone())
                            .build()
                    })
                    .collect(),
            ))
            .build();
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|err| translate(key, &err))?;
        Ok(())
    }

    async fn abort_upload(&self, key: &str, upload_id: &str) -> BlobFsResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|err| translate(key, &err))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobFsResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| BlobFsError::invalid_config(e.to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| translate(key, &err))?;
        Ok(presigned.uri().to_string())
    }

    fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities::default()
            .with_presigned_urls()
            .with_batch_delete_limit(BATCH_DELETE_LIMIT)
    }
}

/// Map an SDK failure onto the portable taxonomy via its error metadata
fn translate<E, R>(key: &str, err: &SdkError<E, R>) -> BlobFsError
where
    E: ProvideErrorMetadata,
{
    match err.code() {
        Some(code) => {
            let message = err.message().unwrap_or("").to_string();
            BlobFsError::from_backend_code(code, &message, key)
        }
        None => BlobFsError::backend("Unknown", describe(err)),
    }
}

fn describe<E, R>(err: &SdkError<E, R>) -> String {
    match err {
        SdkError::ConstructionFailure(_) => "request construction failure".to_string(),
        SdkError::TimeoutError(_) => "request timed out".to_string(),
        SdkError::DispatchFailure(failure) => format!("dispatch failure: {:?}", failure),
        SdkError::ResponseError(_) => "unparseable backend response".to_string(),
        _ => "backend service error".to_string(),
    }
}

fn to_chrono(timestamp: aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}
