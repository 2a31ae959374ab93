use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use gallery_ingest_application::{ApplicationError, ArtifactStore, CopyOutcome};
use gallery_ingest_domain::detect_image_format;
use walkdir::WalkDir;

/// Local-disk placement for staging and permanent storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArtifactStore;

impl ArtifactStore for FsArtifactStore {
    fn ensure_dir(&self, dir: &Path) -> Result<(), ApplicationError> {
        fs::create_dir_all(dir).map_err(|error| {
            ApplicationError::Io(format!("cannot create {}: {error}", dir.display()))
        })
    }

    fn is_dir(&self, dir: &Path) -> bool {
        dir.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn copy_into(
        &self,
        source: &Path,
        dest_dir: &Path,
        overwrite: bool,
    ) -> Result<CopyOutcome, ApplicationError> {
        let file_name = source.file_name().ok_or_else(|| {
            ApplicationError::Validation(format!("not a file path: {}", source.display()))
        })?;
        let destination = dest_dir.join(file_name);
        if destination.exists() && !overwrite {
            return Ok(CopyOutcome::Skipped(destination));
        }
        fs::copy(source, &destination).map_err(|error| {
            ApplicationError::Io(format!(
                "cannot copy {} to {}: {error}",
                source.display(),
                destination.display()
            ))
        })?;
        Ok(CopyOutcome::Copied(destination))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), ApplicationError> {
        fs::rename(from, to).map_err(|error| {
            ApplicationError::Io(format!(
                "cannot move {} to {}: {error}",
                from.display(),
                to.display()
            ))
        })
    }

    fn remove_file(&self, path: &Path) -> Result<(), ApplicationError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(ApplicationError::Io(format!(
                "cannot remove {}: {error}",
                path.display()
            ))),
        }
    }

    fn remove_dir_all(&self, dir: &Path) -> Result<(), ApplicationError> {
        fs::remove_dir_all(dir).map_err(|error| {
            ApplicationError::Io(format!("cannot remove {}: {error}", dir.display()))
        })
    }

    fn list_images(&self, dir: &Path) -> Result<Vec<String>, ApplicationError> {
        if !dir.is_dir() {
            return Err(ApplicationError::Validation(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|error| ApplicationError::Io(error.to_string()))?;
            if !entry.file_type().is_file() || !detect_image_format(entry.path()).is_supported() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn copy_skips_existing_destination_unless_overwriting() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("a.jpg");
        let dest_dir = dir.path().join("full");
        fs::write(&src, b"new").expect("write");
        fs::create_dir_all(&dest_dir).expect("mkdir");
        fs::write(dest_dir.join("a.jpg"), b"old").expect("write");

        let skipped = FsArtifactStore
            .copy_into(&src, &dest_dir, false)
            .expect("copy");
        assert_eq!(skipped, CopyOutcome::Skipped(dest_dir.join("a.jpg")));
        assert_eq!(fs::read(dest_dir.join("a.jpg")).expect("read"), b"old");

        let copied = FsArtifactStore
            .copy_into(&src, &dest_dir, true)
            .expect("copy");
        assert_eq!(copied, CopyOutcome::Copied(dest_dir.join("a.jpg")));
        assert_eq!(fs::read(dest_dir.join("a.jpg")).expect("read"), b"new");
    }

    #[test]
    fn copy_into_missing_directory_is_an_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"x").expect("write");

        assert!(matches!(
            FsArtifactStore.copy_into(&src, &dir.path().join("nope"), false),
            Err(ApplicationError::Io(_))
        ));
    }

    #[test]
    fn rename_moves_a_file_aside() {
        let dir = TempDir::new().expect("tempdir");
        let from = dir.path().join("a.jpg");
        let to = dir.path().join(".a.jpg.bak");
        fs::write(&from, b"older").expect("write");

        FsArtifactStore.rename(&from, &to).expect("rename");

        assert!(!from.exists());
        assert_eq!(fs::read(&to).expect("read"), b"older");
        assert!(matches!(
            FsArtifactStore.rename(&from, &to),
            Err(ApplicationError::Io(_))
        ));
    }

    #[test]
    fn removing_an_absent_file_is_not_an_error() {
        let dir = TempDir::new().expect("tempdir");
        FsArtifactStore
            .remove_file(&dir.path().join("gone.jpg"))
            .expect("remove");
    }

    #[test]
    fn list_images_returns_sorted_supported_names_only() {
        let dir = TempDir::new().expect("tempdir");
        for name in ["b.png", "a.jpg", "notes.txt", "c.WEBP"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }
        fs::create_dir_all(dir.path().join("nested")).expect("mkdir");
        fs::write(dir.path().join("nested").join("d.jpg"), b"x").expect("write");

        let names = FsArtifactStore.list_images(dir.path()).expect("list");

        assert_eq!(names, vec!["a.jpg", "b.png", "c.WEBP"]);
    }

    #[test]
    fn ensure_dir_creates_parents() {
        let dir = TempDir::new().expect("tempdir");
        let nested = dir.path().join("storage").join("100K");
        FsArtifactStore.ensure_dir(&nested).expect("mkdir");
        assert!(FsArtifactStore.is_dir(&nested));
    }
}
