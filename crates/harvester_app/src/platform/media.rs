use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::engine_debug;
use harvester_engine::{
    ensure_output_dir, media_object_name, AtomicFileWriter, MediaError, MediaStore, PersistError,
};

const MAX_MEDIA_BYTES: u64 = 20 * 1024 * 1024;

/// Media store that copies objects below a local directory.
pub struct FsMediaStore {
    client: reqwest::Client,
    writer: AtomicFileWriter,
    public_base: String,
}

impl FsMediaStore {
    /// `public_base` defaults to a `file://` url pointing at `media_dir`.
    pub fn new(
        media_dir: &Path,
        public_base: Option<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        ensure_output_dir(media_dir)?;
        let public_base = match public_base {
            Some(base) => base,
            None => {
                let absolute = media_dir.canonicalize().map_err(PersistError::Io)?;
                format!("file://{}", absolute.display())
            }
        };
        let public_base = format!("{}/", public_base.trim_end_matches('/'));
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            writer: AtomicFileWriter::new(media_dir.to_path_buf()),
            public_base,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let failed = |message: String| MediaError::Download {
            url: url.to_string(),
            message,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| failed(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(status.to_string()));
        }
        if response.content_length().is_some_and(|len| len > MAX_MEDIA_BYTES) {
            return Err(failed("object too large".into()));
        }
        let bytes = response.bytes().await.map_err(|err| failed(err.to_string()))?;
        if bytes.len() as u64 > MAX_MEDIA_BYTES {
            return Err(failed("object too large".into()));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn rehost(&self, external_url: &str, scope_key: &str) -> Result<String, MediaError> {
        let object = media_object_name(scope_key, external_url);
        let durable = format!("{}{}", self.public_base, object);
        if self.writer.exists(&object) {
            engine_debug!("MediaCached object={}", object);
            return Ok(durable);
        }

        let bytes = self.download(external_url).await?;
        self.writer
            .write_bytes(&object, &bytes)
            .map_err(|err| MediaError::Upload {
                url: external_url.to_string(),
                message: err.to_string(),
            })?;
        engine_debug!("MediaStored object={} bytes={}", object, bytes.len());
        Ok(durable)
    }

    fn is_durable(&self, url: &str) -> bool {
        url.starts_with(&self.public_base)
    }
}
