use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use super::error::FileServiceError;
use super::path::{join_object_key, normalize_local_path, normalize_object_key, BackendKind, OBJECT_SEPARATOR};

/// Scheme prefix marking an object store location
pub const S3_SCHEME: &str = "s3://";

/// A file or folder on one of the backends.
///
/// Whether it is a folder is not recorded here; backends work that out
/// from a stat call (local) or prefix listing (object store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileLocation {
    Local { path: PathBuf },
    Object { bucket: String, key: String },
}

impl FileLocation {
    pub fn local(path: impl AsRef<Path>) -> Self {
        FileLocation::Local {
            path: normalize_local_path(path.as_ref()),
        }
    }

    pub fn object(bucket: impl Into<String>, key: impl AsRef<str>) -> Self {
        FileLocation::Object {
            bucket: bucket.into(),
            key: normalize_object_key(key.as_ref()),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            FileLocation::Local { .. } => BackendKind::Local,
            FileLocation::Object { .. } => BackendKind::Object,
        }
    }

    /// Path component as a string, lossy for local paths
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            FileLocation::Local { path } => path.to_string_lossy(),
            FileLocation::Object { key, .. } => Cow::Borrowed(key.as_str()),
        }
    }

    pub fn bucket(&self) -> Option<&str> {
        match self {
            FileLocation::Local { .. } => None,
            FileLocation::Object { bucket, .. } => Some(bucket),
        }
    }

    /// Same backend and bucket, different key
    pub fn with_key(&self, key: &str) -> Self {
        match self {
            FileLocation::Local { .. } => FileLocation::local(key),
            FileLocation::Object { bucket, .. } => FileLocation::object(bucket.clone(), key),
        }
    }

    /// Canonical identity used for equality checks and logging.
    /// Local paths that are not valid UTF-8 render lossily.
    pub fn to_location_string(&self) -> String {
        match self {
            FileLocation::Local { path } => path.to_string_lossy().into_owned(),
            FileLocation::Object { bucket, key } => format!("{}{}/{}", S3_SCHEME, bucket, key),
        }
    }

    pub fn same_location(&self, other: &FileLocation) -> bool {
        match (self, other) {
            (FileLocation::Local { path }, FileLocation::Local { path: other }) => path == other,
            _ => self.to_location_string() == other.to_location_string(),
        }
    }

    /// Whether the location lies under `folder` on the same backend
    pub fn is_within(&self, folder: &FileLocation) -> bool {
        if self.kind() != folder.kind() || self.bucket() != folder.bucket() {
            return false;
        }
        match (self, folder) {
            (FileLocation::Local { path }, FileLocation::Local { path: parent }) => path.starts_with(parent),
            _ => self.key().starts_with(folder.key().as_ref()),
        }
    }

    /// Map this location from under `source_folder` to under `destination_folder`.
    ///
    /// Only the leading occurrence of the folder prefix is replaced. Returns
    /// `None` when the location does not start with that prefix.
    pub fn rebase(&self, source_folder: &FileLocation, destination_folder: &FileLocation) -> Option<FileLocation> {
        let remainder = self.remainder_under(source_folder)?;

        let rebased = match destination_folder {
            FileLocation::Object { bucket, key } => {
                let (tail, boundary) = match remainder {
                    Remainder::Key { tail, boundary } => (tail, boundary),
                    Remainder::Path(relative) => (relative_to_key(&relative), true),
                };
                FileLocation::object(bucket.clone(), join_object_key(key, &tail, boundary))
            }
            FileLocation::Local { path } => {
                let path = match remainder {
                    Remainder::Path(relative) => path.join(relative),
                    Remainder::Key { tail, boundary } => join_key_to_path(path, &tail, boundary),
                };
                FileLocation::local(path)
            }
        };

        Some(rebased)
    }

    fn remainder_under(&self, folder: &FileLocation) -> Option<Remainder> {
        match (self, folder) {
            (FileLocation::Local { path }, FileLocation::Local { path: folder }) => {
                path.strip_prefix(folder).ok().map(|relative| Remainder::Path(relative.to_path_buf()))
            }
            (FileLocation::Object { bucket, key }, FileLocation::Object { bucket: folder_bucket, key: folder_key }) => {
                if bucket != folder_bucket {
                    return None;
                }
                let tail = key.strip_prefix(folder_key.as_str())?;
                let boundary = folder_key.ends_with(OBJECT_SEPARATOR) || tail.starts_with(OBJECT_SEPARATOR);
                Some(Remainder::Key {
                    tail: tail.to_string(),
                    boundary,
                })
            }
            _ => None,
        }
    }
}

/// What is left of a location once its folder prefix is removed
enum Remainder {
    /// Relative local path
    Path(PathBuf),
    /// Rest of an object key; without a boundary it continues the last name
    Key { tail: String, boundary: bool },
}

fn relative_to_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn join_key_to_path(folder: &Path, tail: &str, boundary: bool) -> PathBuf {
    let mut segments = tail.split(OBJECT_SEPARATOR).filter(|segment| !segment.is_empty());

    let mut path = if boundary {
        folder.to_path_buf()
    } else {
        match segments.next() {
            Some(first) => {
                let mut joined = OsString::from(folder.as_os_str());
                joined.push(first);
                PathBuf::from(joined)
            }
            None => folder.to_path_buf(),
        }
    };

    for segment in segments {
        path.push(segment);
    }
    path
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_location_string())
    }
}

impl FromStr for FileLocation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(S3_SCHEME) {
            Some(rest) => {
                let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    anyhow::bail!("Missing bucket name in location: {}", s);
                }
                Ok(FileLocation::object(bucket, key))
            }
            None => {
                if s.is_empty() {
                    anyhow::bail!("Empty location");
                }
                Ok(FileLocation::local(s))
            }
        }
    }
}

impl TryFrom<String> for FileLocation {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FileLocation> for String {
    fn from(value: FileLocation) -> Self {
        value.to_location_string()
    }
}

/// A file confirmed to exist at scan time, with its content fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub location: FileLocation,
    /// MD5 hex digest, or the store-reported ETag
    pub content_hash: String,
    pub size: u64,
    pub mime_type: String,
}

impl ScannedFile {
    /// Identical content. Hashes that are not plain MD5 digests never match.
    pub fn same_content(&self, other: &ScannedFile) -> bool {
        is_comparable_hash(&self.content_hash)
            && is_comparable_hash(&other.content_hash)
            && self.content_hash.eq_ignore_ascii_case(&other.content_hash)
    }
}

/// Multipart ETags (`<hex>-<parts>`) and missing hashes are not content digests
pub(crate) fn is_comparable_hash(hash: &str) -> bool {
    hash.len() == 32 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Guess a MIME type from a file name
pub fn mime_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// One file to copy. Source and destination never share a location.
#[derive(Debug, Clone)]
pub struct CopyOperation {
    source: ScannedFile,
    destination: FileLocation,
}

impl CopyOperation {
    pub fn new(source: ScannedFile, destination: FileLocation) -> anyhow::Result<Self> {
        if source.location.same_location(&destination) {
            return Err(FileServiceError::InvariantViolation(format!(
                "copy source and destination are both {}",
                destination
            ))
            .into());
        }
        Ok(Self { source, destination })
    }

    pub fn source(&self) -> &ScannedFile {
        &self.source
    }

    pub fn destination(&self) -> &FileLocation {
        &self.destination
    }
}

/// Body to persist at a destination
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub destination: FileLocation,
    pub body: Bytes,
}

impl WriteRequest {
    pub fn new(destination: FileLocation, body: impl Into<Bytes>) -> Self {
        Self {
            destination,
            body: body.into(),
        }
    }
}
