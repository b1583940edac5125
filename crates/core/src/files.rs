//! Local file discovery for thread attachments.
//!
//! [`list_files`] enumerates regular files directly inside a directory and
//! [`get_images`] narrows that listing to image extensions. Both swallow
//! errors into an empty listing; the `try_` variants surface them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error};

use crate::domain::file::FileDescriptor;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(Debug, Error)]
pub enum FileListError {
    #[error("directory does not exist: `{0}`")]
    NotFound(PathBuf),
    #[error("path is not a directory: `{0}`")]
    NotADirectory(PathBuf),
    #[error("could not read directory `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },
}

pub fn try_list_files(directory: &Path) -> Result<Vec<FileDescriptor>, FileListError> {
    let metadata = match fs::metadata(directory) {
        Ok(metadata) => metadata,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            return Err(FileListError::NotFound(directory.to_path_buf()));
        }
        Err(source) => return Err(FileListError::Io { path: directory.to_path_buf(), source }),
    };
    if !metadata.is_dir() {
        return Err(FileListError::NotADirectory(directory.to_path_buf()));
    }

    let io_error = |source| FileListError::Io { path: directory.to_path_buf(), source };
    let mut files = Vec::new();
    for entry in fs::read_dir(directory).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        // follows symlinks, so a link to a regular file is listed
        let is_file = fs::metadata(entry.path()).map(|meta| meta.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(descriptor) = FileDescriptor::from_path(entry.path()) {
            files.push(descriptor);
        }
    }

    Ok(files)
}

/// Lists regular files directly inside `directory`. Never fails; problems are
/// logged and produce an empty listing.
pub fn list_files(directory: impl AsRef<Path>) -> Vec<FileDescriptor> {
    let directory = directory.as_ref();
    match try_list_files(directory) {
        Ok(files) => {
            debug!(directory = %directory.display(), file_count = files.len(), "listed directory");
            files
        }
        Err(list_error) => {
            error!(
                event_name = "files.list.failed",
                directory = %directory.display(),
                error = %list_error,
                "could not list directory"
            );
            Vec::new()
        }
    }
}

pub fn is_image(file: &FileDescriptor) -> bool {
    file.extension().is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub fn try_get_images(directory: &Path) -> Result<Vec<FileDescriptor>, FileListError> {
    Ok(try_list_files(directory)?.into_iter().filter(is_image).collect())
}

/// Image files in `directory`. An error and "no images" look the same to the
/// caller: an empty listing.
pub fn get_images(directory: impl AsRef<Path>) -> Vec<FileDescriptor> {
    list_files(directory).into_iter().filter(is_image).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{get_images, list_files, try_get_images, try_list_files, FileListError};

    fn fixture(names: &[&str]) -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        for name in names {
            fs::write(dir.path().join(name), b"bytes").expect("write fixture");
        }
        dir
    }

    fn sorted_names(files: Vec<crate::domain::file::FileDescriptor>) -> Vec<String> {
        let mut names: Vec<String> = files.into_iter().map(|file| file.name).collect();
        names.sort();
        names
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let missing = dir.path().join("nope");

        assert!(list_files(&missing).is_empty());
        assert!(matches!(try_list_files(&missing), Err(FileListError::NotFound(_))));
    }

    #[test]
    fn file_path_lists_nothing() {
        let dir = fixture(&["plain.txt"]);
        let file = dir.path().join("plain.txt");

        assert!(list_files(&file).is_empty());
        assert!(matches!(try_list_files(&file), Err(FileListError::NotADirectory(_))));
    }

    #[test]
    fn lists_regular_files_without_recursing() {
        let dir = fixture(&["a.txt", "b.png"]);
        fs::create_dir(dir.path().join("nested")).expect("nested dir");
        fs::write(dir.path().join("nested").join("c.png"), b"bytes").expect("nested file");

        let files = list_files(dir.path());
        assert_eq!(sorted_names(files.clone()), vec!["a.txt", "b.png"]);

        let png = files.iter().find(|file| file.name == "b.png").expect("png listed");
        assert_eq!(png.path, dir.path().join("b.png"));
        assert_eq!(png.description, "File b.png");
    }

    #[test]
    fn image_filter_is_case_insensitive() {
        let dir = fixture(&["PHOTO.JPG", "photo.bmp", "chart.png", "anim.Gif", "scan.jpeg", "notes"]);

        assert_eq!(
            sorted_names(get_images(dir.path())),
            vec!["PHOTO.JPG", "anim.Gif", "chart.png", "scan.jpeg"]
        );
    }

    #[test]
    fn image_filter_on_missing_directory_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        let missing = dir.path().join("images");

        assert!(get_images(&missing).is_empty());
        assert!(try_get_images(&missing).is_err());
    }
}
