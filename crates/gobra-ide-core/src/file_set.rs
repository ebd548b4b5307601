//! File identities, file sets and their canonical keys.
//!
//! A [`FileSet`] is the unit of verification: one file, or every file of a
//! package. Members are kept sorted by their URI string so a package maps to
//! the same [`FileSetKey`] no matter which member triggered the request.

use std::fmt;
use std::path::{Path, PathBuf};

use gobra_ide_proto::FileData;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileSetError {
    #[error("invalid file URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("{} is not an absolute path", .0.display())]
    NotAbsolute(PathBuf),

    #[error("malformed file set key {key:?}: {reason}")]
    MalformedKey { key: String, reason: String },
}

/// What the backend makes of a file, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// `.gobra`: verified on every trigger.
    Gobra,
    /// `.go` with annotations: verified only on manual request.
    Go,
    /// Anything else. Never sent to the backend.
    Other,
}

/// Canonical identity of a source file: its URI.
///
/// Equality and ordering follow the URI string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Url);

impl FileId {
    pub fn parse(uri: &str) -> Result<Self, FileSetError> {
        Url::parse(uri)
            .map(Self)
            .map_err(|e| FileSetError::InvalidUri {
                uri: uri.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn from_path(path: &Path) -> Result<Self, FileSetError> {
        Url::from_file_path(path)
            .map(Self)
            .map_err(|()| FileSetError::NotAbsolute(path.to_path_buf()))
    }

    pub fn from_url(url: Url) -> Self {
        Self(url)
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.0.to_file_path().ok()
    }

    pub fn kind(&self) -> FileKind {
        let path = self.0.path();
        if path.ends_with(".gobra") {
            FileKind::Gobra
        } else if path.ends_with(".go") {
            FileKind::Go
        } else {
            FileKind::Other
        }
    }

    /// Whether the backend accepts this file at all.
    pub fn is_verifiable(&self) -> bool {
        self.kind() != FileKind::Other
    }

    /// Last path segment, for messages.
    pub fn file_name(&self) -> &str {
        self.0
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.0.as_str())
    }

    /// The file named like this one plus `suffix` (`a.gobra` -> `a.gobra.go`).
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, FileSetError> {
        Self::parse(&format!("{}{}", self.as_str(), suffix))
    }

    /// Path and URI as the backend wants them.
    pub fn file_data(&self) -> FileData {
        let file_path = self
            .to_file_path()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.path().to_string());
        FileData {
            file_path,
            file_uri: self.as_str().to_string(),
        }
    }

    /// Path for user-facing messages, falling back to the URI.
    pub fn display_path(&self) -> String {
        self.to_file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.as_str().to_string())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sorted, duplicate-free sequence of files verified together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FileSet(Vec<FileId>);

impl FileSet {
    pub fn new(files: impl IntoIterator<Item = FileId>) -> Self {
        let mut files: Vec<FileId> = files.into_iter().collect();
        files.sort();
        files.dedup();
        Self(files)
    }

    pub fn single(file: FileId) -> Self {
        Self(vec![file])
    }

    /// Build a set from URI strings, as the backend reports them.
    pub fn from_uris<S: AsRef<str>>(uris: &[S]) -> Result<Self, FileSetError> {
        uris.iter()
            .map(|uri| FileId::parse(uri.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, file: &FileId) -> bool {
        self.0.binary_search(file).is_ok()
    }

    pub fn key(&self) -> FileSetKey {
        FileSetKey::encode(self)
    }

    pub fn file_data(&self) -> Vec<FileData> {
        self.0.iter().map(FileId::file_data).collect()
    }
}

impl FromIterator<FileId> for FileSet {
    fn from_iter<I: IntoIterator<Item = FileId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a FileId;
    type IntoIter = std::slice::Iter<'a, FileId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Canonical string identity of a [`FileSet`]: a JSON array of its member
/// URIs in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileSetKey(String);

impl FileSetKey {
    pub fn encode(files: &FileSet) -> Self {
        let members = files
            .iter()
            .map(|f| serde_json::Value::String(f.as_str().to_string()))
            .collect();
        Self(serde_json::Value::Array(members).to_string())
    }

    /// Recover the file set. `decode(encode(s)) == s` for every set.
    pub fn decode(&self) -> Result<FileSet, FileSetError> {
        let uris: Vec<String> =
            serde_json::from_str(&self.0).map_err(|e| FileSetError::MalformedKey {
                key: self.0.clone(),
                reason: e.to_string(),
            })?;
        FileSet::from_uris(&uris)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(uri: &str) -> FileId {
        FileId::parse(uri).expect("valid uri")
    }

    #[test]
    fn key_is_independent_of_member_order() {
        let a = id("file:///pkg/a.gobra");
        let b = id("file:///pkg/b.gobra");
        let c = id("file:///pkg/c.go");

        let from_b = FileSet::new([b.clone(), a.clone(), c.clone()]);
        let from_c = FileSet::new([c, a, b]);
        assert_eq!(from_b.key(), from_c.key());
        assert_eq!(
            from_b.key().as_str(),
            r#"["file:///pkg/a.gobra","file:///pkg/b.gobra","file:///pkg/c.go"]"#
        );
    }

    #[test]
    fn decode_restores_members_in_order() {
        let set = FileSet::new([id("file:///pkg/z.gobra"), id("file:///pkg/a%20b.gobra")]);
        let decoded = set.key().decode().expect("decodes");
        assert_eq!(decoded, set);
        assert_eq!(decoded.iter().next(), Some(&id("file:///pkg/a%20b.gobra")));
    }

    #[test]
    fn distinct_sets_have_distinct_keys() {
        // A naive separator-joined key would collide here
        let joined = FileSet::single(id("file:///a,file:///b"));
        let pair = FileSet::new([id("file:///a"), id("file:///b")]);
        assert_ne!(joined.key(), pair.key());
    }

    #[test]
    fn duplicates_collapse() {
        let a = id("file:///pkg/a.gobra");
        let set = FileSet::new([a.clone(), a.clone()]);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&a));
    }

    #[test]
    fn malformed_key_is_an_error() {
        let key = FileSetKey("not json".to_string());
        assert!(matches!(key.decode(), Err(FileSetError::MalformedKey { .. })));
    }

    #[test]
    fn kinds_follow_extension() {
        assert_eq!(id("file:///x/a.gobra").kind(), FileKind::Gobra);
        assert_eq!(id("file:///x/a.go").kind(), FileKind::Go);
        assert_eq!(id("file:///x/a.gobra.go").kind(), FileKind::Go);
        assert_eq!(id("file:///x/a.rs").kind(), FileKind::Other);
        assert!(!id("file:///x/go").is_verifiable());
    }

    #[test]
    fn suffix_and_names() {
        let file = id("file:///pkg/a.gobra");
        let goified = file.with_suffix(".go").expect("valid");
        assert_eq!(goified.as_str(), "file:///pkg/a.gobra.go");
        assert_eq!(goified.file_name(), "a.gobra.go");
    }

    #[cfg(unix)]
    #[test]
    fn path_round_trip() {
        let file = FileId::from_path(Path::new("/pkg/a.gobra")).expect("absolute");
        assert_eq!(file.as_str(), "file:///pkg/a.gobra");
        assert_eq!(file.to_file_path(), Some(PathBuf::from("/pkg/a.gobra")));
        let data = file.file_data();
        assert_eq!(data.file_path, "/pkg/a.gobra");
        assert!(matches!(
            FileId::from_path(Path::new("relative.gobra")),
            Err(FileSetError::NotAbsolute(_))
        ));
    }
}
