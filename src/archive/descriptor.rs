use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Layout of the `Modified` field written by the upstream application
pub const MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One file to place in the archive, as stored by the metadata lookup.
///
/// Field names follow the JSON written by the upstream application
/// (`S3Path`, `FileName`, ...). Lower-case spellings are accepted too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileDescriptor {
    /// Display name, sanitized before it becomes part of an entry path
    #[serde(rename = "FileName", alias = "fileName", alias = "filename", default)]
    pub file_name: String,

    /// Slash-separated folder prefix inside the archive
    #[serde(rename = "Folder", alias = "folder", default)]
    pub folder: Option<String>,

    /// Object store key. Used as-is, never sanitized.
    #[serde(rename = "S3Path", alias = "s3Path", alias = "s3path")]
    pub storage_path: String,

    #[serde(
        rename = "FileID",
        alias = "fileId",
        alias = "fileid",
        default,
        deserialize_with = "lenient_id"
    )]
    pub file_id: Option<i64>,

    #[serde(
        rename = "ProjectID",
        alias = "projectId",
        alias = "projectid",
        default,
        deserialize_with = "lenient_id"
    )]
    pub project_id: Option<i64>,

    #[serde(rename = "ProjectName", alias = "projectName", alias = "projectname", default)]
    pub project_name: Option<String>,

    /// UTC timestamp, `YYYY-MM-DDTHH:MM:SSZ`
    #[serde(rename = "Modified", alias = "modified", default)]
    pub modified_at: Option<String>,
}

impl FileDescriptor {
    /// Create a descriptor with just a display name and a storage key
    pub fn new(file_name: impl Into<String>, storage_path: impl Into<String>) -> Self {
        FileDescriptor {
            file_name: file_name.into(),
            storage_path: storage_path.into(),
            ..Default::default()
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_project(mut self, id: i64, name: impl Into<String>) -> Self {
        self.project_id = Some(id);
        self.project_name = Some(name.into());
        self
    }

    pub fn with_modified(mut self, modified: impl Into<String>) -> Self {
        self.modified_at = Some(modified.into());
        self
    }

    /// Grouping id, only when it is a real (positive) project id
    pub fn grouping_project(&self) -> Option<i64> {
        self.project_id.filter(|id| *id > 0)
    }

    /// Parse the modification timestamp.
    ///
    /// `Ok(None)` when no timestamp was supplied; `Err` when one was supplied
    /// but does not match [`MODIFIED_FORMAT`].
    pub fn modified_time(&self) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
        match self.modified_at.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => NaiveDateTime::parse_from_str(raw, MODIFIED_FORMAT)
                .map(|naive| Some(naive.and_utc())),
        }
    }
}

/// Accept ids written either as JSON numbers or as decimal strings.
/// An empty string means "no id".
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(n)) => Ok(Some(n)),
        Some(RawId::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawId::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid id {s:?}: {e}"))),
    }
}
