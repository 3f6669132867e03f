//! Icon upload staging
//!
//! An uploaded icon is streamed into a temporary file in a staging
//! directory next to the uploads directory, never inside it, so nothing
//! half-received is ever served. The submission validator then either
//! promotes it to its public name or discards it.
//!
//! Staged files are owned by [`tempfile::TempPath`] and removed when
//! dropped, including when the request future is cancelled. A promoted icon
//! stays removable through [`PublishedIcon`] until its plugin record is
//! stored.
//!
//! Writing stops once the configured size limit is exceeded; the upload is
//! only marked oversized so the rejection can be reported in order.

use rand::Rng;
use sdk::errors::MarketError;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Icon URL used by plugins without an upload
pub const PLACEHOLDER_ICON: &str = "/placeholder.svg";

/// URL prefix under which the uploads directory is served
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Content types accepted for icons
pub const ALLOWED_CONTENT_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const SNIFF_LEN: usize = 8;
const STAGING_PREFIX: &str = "icon-";

/// Image format recognised from file content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

/// Identify PNG or JPEG from leading bytes
pub fn sniff_image(head: &[u8]) -> Option<ImageKind> {
    if head.starts_with(PNG_MAGIC) {
        Some(ImageKind::Png)
    } else if head.starts_with(JPEG_MAGIC) {
        Some(ImageKind::Jpeg)
    } else {
        None
    }
}

/// Extension used for the public file name
///
/// Keeps `.png`, `.jpg` or `.jpeg` from the client name, anything else
/// becomes `.png`.
pub fn safe_extension(original_name: Option<&str>) -> &'static str {
    let ext = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => ".png",
        Some("jpg") => ".jpg",
        Some("jpeg") => ".jpeg",
        _ => ".png",
    }
}

/// Sibling of the uploads directory used for staging
///
/// Staying on the same filesystem keeps promotion a plain rename.
fn staging_dir_for(dir: &Path) -> PathBuf {
    match dir.file_name() {
        Some(name) => {
            let mut staging = name.to_os_string();
            staging.push(".staging");
            dir.with_file_name(staging)
        }
        None => dir.join(".staging"),
    }
}

/// Uploads directory with a size limit
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
    staging_dir: PathBuf,
    max_bytes: u64,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        let dir = dir.into();
        Self {
            staging_dir: staging_dir_for(&dir),
            dir,
            max_bytes,
        }
    }

    /// Directory served under [`UPLOADS_ROUTE`]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding uploads that have not been accepted yet
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Start staging an upload
    pub async fn begin(
        &self,
        original_name: Option<String>,
        content_type: Option<String>,
    ) -> Result<StagingFile, MarketError> {
        fs::create_dir_all(&self.dir).await?;
        fs::create_dir_all(&self.staging_dir).await?;

        let temp = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.staging_dir)?;
        let (file, path) = temp.into_parts();
        debug!("Staging upload at {}", path.display());

        Ok(StagingFile {
            path,
            file: fs::File::from_std(file),
            dir: self.dir.clone(),
            max_bytes: self.max_bytes,
            written: 0,
            oversized: false,
            head: Vec::with_capacity(SNIFF_LEN),
            original_name,
            content_type,
        })
    }

    /// Remove staged files left behind by a previous process
    ///
    /// Returns how many files were removed.
    pub async fn purge_staging(&self) -> Result<usize, MarketError> {
        let mut entries = match fs::read_dir(&self.staging_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {} stale staged upload(s)", removed);
        }
        Ok(removed)
    }
}

/// An upload being written to disk
///
/// Dropping it removes the staging file.
pub struct StagingFile {
    path: TempPath,
    file: fs::File,
    dir: PathBuf,
    max_bytes: u64,
    written: u64,
    oversized: bool,
    head: Vec<u8>,
    original_name: Option<String>,
    content_type: Option<String>,
}

impl StagingFile {
    /// Append a chunk of the upload
    ///
    /// Chunks past the size limit are dropped and the upload is marked
    /// oversized.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), MarketError> {
        if self.oversized {
            return Ok(());
        }
        if self.written + chunk.len() as u64 > self.max_bytes {
            self.oversized = true;
            return Ok(());
        }

        if self.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.head.len()).min(chunk.len());
            self.head.extend_from_slice(&chunk[..take]);
        }

        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Finish writing and hand over the staged upload
    pub async fn finish(mut self) -> Result<StagedUpload, MarketError> {
        self.file.flush().await?;
        Ok(self.into_staged(false))
    }

    /// Hand over an upload whose stream broke before the end
    ///
    /// The result always fails the icon check.
    pub fn interrupted(self) -> StagedUpload {
        self.into_staged(true)
    }

    fn into_staged(self, interrupted: bool) -> StagedUpload {
        StagedUpload {
            path: self.path,
            dir: self.dir,
            size: self.written,
            oversized: self.oversized,
            interrupted,
            head: self.head,
            original_name: self.original_name.filter(|n| !n.is_empty()),
            content_type: self.content_type,
        }
    }
}

/// A received upload awaiting a verdict
///
/// Dropping it removes the staged file.
#[derive(Debug)]
pub struct StagedUpload {
    path: TempPath,
    dir: PathBuf,
    size: u64,
    oversized: bool,
    interrupted: bool,
    head: Vec<u8>,
    original_name: Option<String>,
    content_type: Option<String>,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_oversized(&self) -> bool {
        self.oversized
    }

    /// Whether the upload stream broke before the file was complete
    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    /// Image format detected from the first bytes
    pub fn detected_kind(&self) -> Option<ImageKind> {
        sniff_image(&self.head)
    }

    /// A file input left empty by the browser: no name and no bytes
    pub fn is_blank(&self) -> bool {
        self.size == 0 && !self.oversized && !self.interrupted && self.original_name.is_none()
    }

    /// Move the upload to its public name
    pub fn promote(self) -> Result<PublishedIcon, MarketError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let name = format!(
            "{}-{}{}",
            millis,
            random_suffix(10),
            safe_extension(self.original_name.as_deref())
        );
        let target = self.dir.join(&name);

        // A failed rename drops the temp path with the error, removing it
        self.path
            .persist_noclobber(&target)
            .map_err(|e| MarketError::Io(e.error))?;

        debug!("Promoted upload to {}", target.display());
        Ok(PublishedIcon {
            url: format!("{}/{}", UPLOADS_ROUTE, name),
            path: Some(target),
        })
    }

    /// Remove the staged file now
    pub fn discard(self) {
        debug!("Discarding staged upload {}", self.path.display());
    }
}

/// A promoted icon not yet referenced by a stored plugin
///
/// Dropping it removes the public file; [`PublishedIcon::keep`] hands over
/// the URL and leaves the file in place.
#[derive(Debug)]
pub struct PublishedIcon {
    url: String,
    path: Option<PathBuf>,
}

impl PublishedIcon {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Keep the file and return its URL
    pub fn keep(mut self) -> String {
        self.path = None;
        std::mem::take(&mut self.url)
    }
}

impl Drop for PublishedIcon {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed unclaimed icon {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
