//! Upload stage: ships an artifact to an object store
//!
//! The store is reached through [`ObjectStore`], so tests can substitute
//! [`mock::MockObjectStore`] for the S3 client. Large files are sent to S3
//! as multipart uploads.

use crate::artifact::Artifact;
use crate::config::{DestinationConfig, DestinationMethod, NamedDestination};
use crate::error::BackupError;
use anyhow::{Context, Result};
use aws_sdk_s3 as s3;
use s3::config::{BehaviorVersion, Credentials, Region};
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use s3::types::{CompletedMultipartUpload, CompletedPart};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

const MIB: u64 = 1024 * 1024;

/// Files above this size are sent as a multipart upload
pub const MULTIPART_THRESHOLD: u64 = 100 * MIB;

/// Preferred part size; grown for very large files to stay under the part limit
pub const PART_SIZE: u64 = 64 * MIB;

/// S3 accepts at most this many parts per upload
pub const MAX_PARTS: u64 = 10_000;

/// Minimal object store interface used by the upload stage
pub trait ObjectStore: Send + Sync {
    /// Store the local file under `key`. A single attempt, no retries.
    fn put_object(
        &self,
        local_path: &Path,
        destination: &DestinationConfig,
        key: &str,
    ) -> Result<()>;
}

/// Where an uploaded artifact ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub destination: String,
    pub bucket: String,
    pub key: String,
}

/// How credentials for a destination are obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Access key pair from the configuration
    Explicit { access_key_id: String },
    /// The SDK default chain (environment, profile, instance role, ...)
    Ambient,
}

pub fn credential_source(destination: &DestinationConfig) -> CredentialSource {
    match (&destination.access_key_id, &destination.secret_access_key) {
        (Some(id), Some(_)) => CredentialSource::Explicit {
            access_key_id: id.clone(),
        },
        _ => CredentialSource::Ambient,
    }
}

/// Object key for an artifact: `prefix/filename`, or just the file name
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// One slice of a multipart upload. Part numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub number: i32,
    pub offset: u64,
    pub length: u64,
}

pub fn uses_multipart(size: u64) -> bool {
    size > MULTIPART_THRESHOLD
}

/// Split `size` bytes into consecutive parts of `PART_SIZE`, or larger when
/// the file would otherwise need more than `MAX_PARTS` parts
pub fn plan_parts(size: u64) -> Vec<PartRange> {
    let part_size = PART_SIZE.max(size.div_ceil(MAX_PARTS));

    let mut parts = Vec::new();
    let mut offset = 0;
    while offset < size {
        let length = part_size.min(size - offset);
        parts.push(PartRange {
            number: parts.len() as i32 + 1,
            offset,
            length,
        });
        offset += length;
    }
    parts
}

fn read_part(path: &Path, part: &PartRange) -> Result<Vec<u8>> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(part.offset))?;

    let mut buf = vec![0; part.length as usize];
    file.read_exact(&mut buf).with_context(|| {
        format!("Failed to read part {} of {}", part.number, path.display())
    })?;
    Ok(buf)
}

fn sdk_error<E: std::error::Error>(err: E) -> anyhow::Error {
    anyhow::anyhow!("{}", DisplayErrorContext(err))
}

/// Upload an artifact. The local file is only read, never moved or removed.
pub fn upload(
    store: &dyn ObjectStore,
    artifact: &Artifact,
    destination: &NamedDestination,
) -> Result<UploadReceipt, BackupError> {
    let fail = |reason: String| BackupError::Upload {
        path: artifact.path.clone(),
        destination: destination.name.clone(),
        reason,
    };

    let file_name = artifact
        .file_name()
        .ok_or_else(|| fail("artifact has no valid file name".to_string()))?;

    let key = object_key(&destination.config.prefix, file_name);
    let bucket = &destination.config.bucket;

    debug!(
        "Uploading {:?} to {} ({:?} credentials)",
        artifact.path,
        destination.name,
        credential_source(&destination.config)
    );

    match destination.config.method {
        DestinationMethod::S3 => store
            .put_object(&artifact.path, &destination.config, &key)
            .map_err(|e| fail(format!("{:#}", e)))?,
    }

    info!("Uploaded {} -> s3://{}/{}", artifact.path.display(), bucket, key);

    Ok(UploadReceipt {
        destination: destination.name.clone(),
        bucket: bucket.clone(),
        key,
    })
}

/// S3 (and S3-compatible) store backed by the AWS SDK
pub struct S3Store {
    runtime: tokio::runtime::Runtime,
}

impl S3Store {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create runtime for S3 uploads")?;
        Ok(Self { runtime })
    }

    async fn client(destination: &DestinationConfig) -> s3::Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(ref region) = destination.region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let Some(ref endpoint) = destination.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }

        // Explicit keys win over the default credential chain
        if let (Some(id), Some(secret)) =
            (&destination.access_key_id, &destination.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.expose().to_string(),
                None,
                None,
                "backup-orchestrator-config",
            ));
        }

        let sdk_config = loader.load().await;
        s3::Client::new(&sdk_config)
    }
}

impl S3Store {
    async fn put_single(
        client: &s3::Client,
        local_path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .with_context(|| format!("Failed to read {}", local_path.display()))?;

        client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("PutObject s3://{}/{} failed", bucket, key))?;

        Ok(())
    }

    async fn put_multipart(
        client: &s3::Client,
        local_path: &Path,
        bucket: &str,
        key: &str,
        size: u64,
    ) -> Result<()> {
        let created = client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("CreateMultipartUpload s3://{}/{} failed", bucket, key))?;

        let upload_id = created
            .upload_id()
            .context("CreateMultipartUpload returned no upload id")?
            .to_string();

        let result = Self::upload_parts(client, local_path, bucket, key, &upload_id, size).await;

        if result.is_err() {
            // Otherwise the uploaded parts keep accruing storage
            if let Err(e) = client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!(
                    "Failed to abort multipart upload {} for s3://{}/{}: {}",
                    upload_id,
                    bucket,
                    key,
                    DisplayErrorContext(e)
                );
            }
        }

        result
    }

    async fn upload_parts(
        client: &s3::Client,
        local_path: &Path,
        bucket: &str,
        key: &str,
        upload_id: &str,
        size: u64,
    ) -> Result<()> {
        let parts = plan_parts(size);
        let mut completed = Vec::with_capacity(parts.len());

        for part in &parts {
            let body = ByteStream::from(read_part(local_path, part)?);

            let uploaded = client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part.number)
                .body(body)
                .send()
                .await
                .map_err(sdk_error)
                .with_context(|| {
                    format!("UploadPart {} of s3://{}/{} failed", part.number, bucket, key)
                })?;

            debug!("Uploaded part {}/{} of {}", part.number, parts.len(), key);

            completed.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part.number)
                    .build(),
            );
        }

        client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("CompleteMultipartUpload s3://{}/{} failed", bucket, key))?;

        Ok(())
    }
}

impl ObjectStore for S3Store {
    fn put_object(
        &self,
        local_path: &Path,
        destination: &DestinationConfig,
        key: &str,
    ) -> Result<()> {
        let size = std::fs::metadata(local_path)
            .with_context(|| format!("Failed to read {}", local_path.display()))?
            .len();

        self.runtime.block_on(async {
            let client = Self::client(destination).await;
            let bucket = destination.bucket.as_str();

            if uses_multipart(size) {
                debug!("{} is {} bytes, using multipart upload", local_path.display(), size);
                Self::put_multipart(&client, local_path, bucket, key, size).await
            } else {
                Self::put_single(&client, local_path, bucket, key).await
            }
        })
    }
}

/// In-memory object store for tests
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Recorded upload
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct UploadCall {
        pub local_path: std::path::PathBuf,
        pub bucket: String,
        pub key: String,
        /// Whether the file existed when the upload was attempted
        pub file_existed: bool,
    }

    #[derive(Clone, Default)]
    pub struct MockObjectStore {
        pub uploads: Arc<Mutex<Vec<UploadCall>>>,
        /// Keys containing any of these strings fail to upload
        failing: Arc<Mutex<Vec<String>>>,
    }

    impl MockObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make uploads whose key contains `needle` fail
        pub fn fail_keys_containing(self, needle: &str) -> Self {
            self.failing.lock().unwrap().push(needle.to_string());
            self
        }

        /// Make every upload fail
        pub fn failing() -> Self {
            Self::new().fail_keys_containing("")
        }

        pub fn get_uploads(&self) -> Vec<UploadCall> {
            self.uploads.lock().unwrap().clone()
        }

        pub fn uploaded_keys(&self) -> Vec<String> {
            self.get_uploads().into_iter().map(|u| u.key).collect()
        }
    }

    impl ObjectStore for MockObjectStore {
        fn put_object(
            &self,
            local_path: &Path,
            destination: &DestinationConfig,
            key: &str,
        ) -> Result<()> {
            self.uploads.lock().unwrap().push(UploadCall {
                local_path: local_path.to_path_buf(),
                bucket: destination.bucket.clone(),
                key: key.to_string(),
                file_existed: local_path.is_file(),
            });

            if self.failing.lock().unwrap().iter().any(|n| key.contains(n.as_str())) {
                anyhow::bail!("simulated network failure for {}", key);
            }

            Ok(())
        }
    }
}
