//! Text-level edits of generated project files.
//!
//! Files are treated as opaque text: a patch is a `String -> String` function
//! applied under atomic replacement. The functions here operate on a project
//! directory; [`crate::lifecycle::TemplateProject`] enforces that they only run
//! before launch.

use crate::shared::fs_atomic::atomic_write_file;
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("file {path} does not exist in project {project}")]
    FileNotFoundInProject { path: String, project: String },
    #[error("path {path} is not a relative path inside the project")]
    PathOutsideProject { path: String },
    #[error("failed to read project file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write project file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Joins `relative_path` onto `project_dir`, refusing absolute paths and `..`.
pub fn resolve_in_project(project_dir: &Path, relative_path: &str) -> Result<PathBuf, PatchError> {
    let relative = Path::new(relative_path);
    let escapes = relative.as_os_str().is_empty()
        || relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
    if escapes {
        return Err(PatchError::PathOutsideProject {
            path: relative_path.to_string(),
        });
    }
    Ok(project_dir.join(relative))
}

/// Reads the whole file, applies `transform`, and atomically writes the result.
pub fn update_file<F>(
    project_dir: &Path,
    relative_path: &str,
    transform: F,
) -> Result<PathBuf, PatchError>
where
    F: FnOnce(String) -> String,
{
    let path = resolve_in_project(project_dir, relative_path)?;
    if !path.is_file() {
        return Err(PatchError::FileNotFoundInProject {
            path: relative_path.to_string(),
            project: project_dir.display().to_string(),
        });
    }

    let original = fs::read_to_string(&path).map_err(|source| PatchError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let patched = transform(original);
    atomic_write_file(&path, patched.as_bytes()).map_err(|source| PatchError::Write {
        path: path.display().to_string(),
        source,
    })?;

    tracing::debug!(file = %path.display(), "patched project file");
    Ok(path)
}

/// Replaces every occurrence of `placeholder`.
pub fn replace_in_file(
    project_dir: &Path,
    relative_path: &str,
    placeholder: &str,
    replacement: &str,
) -> Result<PathBuf, PatchError> {
    update_file(project_dir, relative_path, |content| {
        content.replace(placeholder, replacement)
    })
}

/// Writes `source_content` as a new (or replaced) file, creating parent
/// directories as needed.
pub fn add_file_from_source(
    project_dir: &Path,
    source_content: &str,
    target_relative_path: &str,
) -> Result<PathBuf, PatchError> {
    let path = resolve_in_project(project_dir, target_relative_path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PatchError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }
    atomic_write_file(&path, source_content.as_bytes()).map_err(|source| PatchError::Write {
        path: path.display().to_string(),
        source,
    })?;

    tracing::debug!(file = %path.display(), "added project file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_rejects_escaping_paths() {
        let dir = tempdir().expect("tempdir");
        for bad in ["../outside.cs", "/etc/passwd", "src/../../x", ""] {
            let err = resolve_in_project(dir.path(), bad).expect_err(bad);
            assert!(matches!(err, PatchError::PathOutsideProject { .. }), "{bad}");
        }
        let ok = resolve_in_project(dir.path(), "src/./Program.cs").expect("inside");
        assert!(ok.starts_with(dir.path()));
    }

    #[test]
    fn update_file_reports_missing_files_with_relative_path() {
        let dir = tempdir().expect("tempdir");
        let err = update_file(dir.path(), "Startup.cs", |s| s).expect_err("missing");
        match err {
            PatchError::FileNotFoundInProject { path, .. } => assert_eq!(path, "Startup.cs"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn update_file_on_directory_is_not_found() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("Controllers")).expect("mkdir");
        let err = update_file(dir.path(), "Controllers", |s| s).expect_err("dir");
        assert!(matches!(err, PatchError::FileNotFoundInProject { .. }));
    }

    #[test]
    fn transform_receives_full_content() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), "line1\nline2\n").expect("write");
        update_file(dir.path(), "a.txt", |content| {
            assert_eq!(content, "line1\nline2\n");
            content.to_uppercase()
        })
        .expect("patch");
        assert_eq!(
            fs::read_to_string(dir.path().join("a.txt")).expect("read"),
            "LINE1\nLINE2\n"
        );
    }
}
