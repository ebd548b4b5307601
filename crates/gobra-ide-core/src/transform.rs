//! Source-to-source transformations between Gobra and annotated Go.

use std::collections::HashSet;

use gobra_ide_proto::Outbound;

use crate::file_set::{FileId, FileKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformDirection {
    /// `.gobra` to annotated `.go`.
    Goify,
    /// Annotated `.go` to `.gobra`.
    Gobrafy,
}

impl TransformDirection {
    /// The only file kind this direction accepts.
    pub fn source_kind(self) -> FileKind {
        match self {
            TransformDirection::Goify => FileKind::Gobra,
            TransformDirection::Gobrafy => FileKind::Go,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            TransformDirection::Goify => "Goify",
            TransformDirection::Gobrafy => "Gobrafy",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            TransformDirection::Goify => "Goification",
            TransformDirection::Gobrafy => "Gobrafication",
        }
    }

    fn source_label(self) -> &'static str {
        match self {
            TransformDirection::Goify => "Gobra",
            TransformDirection::Gobrafy => "Go",
        }
    }

    pub fn wrong_kind_message(self) -> String {
        format!("Can only {} {} files!", self.verb(), self.source_label())
    }

    pub fn already_running_message(self, file: &FileId) -> String {
        let shown = match self {
            TransformDirection::Goify => file.to_string(),
            TransformDirection::Gobrafy => file.display_path(),
        };
        format!("There is already a {} running for file {}", self.noun(), shown)
    }

    pub fn failure_message(self, subject: &FileId) -> String {
        format!(
            "An error occured during the {} of {}",
            self.noun(),
            subject.display_path()
        )
    }

    pub fn request(self, file: &FileId) -> Outbound {
        match self {
            TransformDirection::Goify => Outbound::GoifyFile(file.file_data()),
            TransformDirection::Gobrafy => Outbound::GobrafyFile(file.file_data()),
        }
    }
}

/// Files with a transformation in flight, one set per direction.
///
/// A file can only ever sit in the set matching its kind, so no file is in
/// both.
#[derive(Debug, Default)]
pub struct TransformTrackers {
    goify: HashSet<FileId>,
    gobrafy: HashSet<FileId>,
}

impl TransformTrackers {
    fn set(&self, direction: TransformDirection) -> &HashSet<FileId> {
        match direction {
            TransformDirection::Goify => &self.goify,
            TransformDirection::Gobrafy => &self.gobrafy,
        }
    }

    fn set_mut(&mut self, direction: TransformDirection) -> &mut HashSet<FileId> {
        match direction {
            TransformDirection::Goify => &mut self.goify,
            TransformDirection::Gobrafy => &mut self.gobrafy,
        }
    }

    pub fn contains(&self, direction: TransformDirection, file: &FileId) -> bool {
        self.set(direction).contains(file)
    }

    /// Returns `false` if a transformation of `file` is already running.
    pub fn insert(&mut self, direction: TransformDirection, file: FileId) -> bool {
        self.set_mut(direction).insert(file)
    }

    pub fn remove(&mut self, direction: TransformDirection, file: &FileId) -> bool {
        self.set_mut(direction).remove(file)
    }

    /// Whether any transformation of `file` is in flight.
    pub fn involves(&self, file: &FileId) -> bool {
        self.goify.contains(file) || self.gobrafy.contains(file)
    }

    pub fn is_empty(&self) -> bool {
        self.goify.is_empty() && self.gobrafy.is_empty()
    }

    pub fn clear(&mut self) {
        self.goify.clear();
        self.gobrafy.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trackers_are_independent_per_direction() {
        let gobra = FileId::parse("file:///pkg/a.gobra").expect("uri");
        let go = FileId::parse("file:///pkg/b.go").expect("uri");
        let mut trackers = TransformTrackers::default();

        assert!(trackers.insert(TransformDirection::Goify, gobra.clone()));
        assert!(!trackers.insert(TransformDirection::Goify, gobra.clone()));
        assert!(trackers.insert(TransformDirection::Gobrafy, go.clone()));

        assert!(trackers.contains(TransformDirection::Goify, &gobra));
        assert!(!trackers.contains(TransformDirection::Gobrafy, &gobra));
        assert!(trackers.involves(&go));

        assert!(trackers.remove(TransformDirection::Goify, &gobra));
        assert!(!trackers.involves(&gobra));
        trackers.clear();
        assert!(trackers.is_empty());
    }

    #[test]
    fn messages_name_the_direction() {
        assert_eq!(
            TransformDirection::Goify.wrong_kind_message(),
            "Can only Goify Gobra files!"
        );
        assert_eq!(
            TransformDirection::Gobrafy.wrong_kind_message(),
            "Can only Gobrafy Go files!"
        );
        let file = FileId::parse("file:///pkg/a.gobra").expect("uri");
        assert_eq!(
            TransformDirection::Goify.already_running_message(&file),
            "There is already a Goification running for file file:///pkg/a.gobra"
        );
    }

    #[cfg(unix)]
    #[test]
    fn gobrafication_in_flight_names_the_path() {
        let file = FileId::parse("file:///pkg/a.go").expect("uri");
        assert_eq!(
            TransformDirection::Gobrafy.already_running_message(&file),
            "There is already a Gobrafication running for file /pkg/a.go"
        );
    }

    #[test]
    fn requests_use_matching_method() {
        let file = FileId::parse("file:///pkg/a.go").expect("uri");
        assert_eq!(
            TransformDirection::Gobrafy.request(&file).method(),
            "gobraServer/gobrafyFile"
        );
        assert_eq!(
            TransformDirection::Goify.request(&file).method(),
            "gobraServer/goifyFile"
        );
    }
}
