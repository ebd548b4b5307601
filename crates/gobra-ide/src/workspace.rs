//! Package resolution on the file system.

use std::path::Path;

use gobra_ide_core::{FileId, Workspace};
use tracing::warn;

/// A package is every `.gobra` and `.go` file in the directory of the file
/// being verified. Package clauses are not inspected.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWorkspace;

impl FsWorkspace {
    fn list(dir: &Path) -> std::io::Result<Vec<FileId>> {
        let mut members = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match FileId::from_path(&entry.path()) {
                Ok(file) if file.is_verifiable() => members.push(file),
                Ok(_) => {}
                Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }
        members.sort();
        Ok(members)
    }
}

impl Workspace for FsWorkspace {
    fn package_files(&self, file: &FileId) -> Vec<FileId> {
        let Some(dir) = file.to_file_path().and_then(|p| p.parent().map(Path::to_path_buf)) else {
            warn!("{} is not a local file, it has no package", file);
            return Vec::new();
        };
        match Self::list(&dir) {
            Ok(members) => members,
            Err(e) => {
                warn!("Failed to list package directory {}: {}", dir.display(), e);
                Vec::new()
            }
        }
    }
}
