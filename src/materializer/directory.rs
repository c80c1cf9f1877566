use super::MaterializeError;
use crate::shared::ids::{InstanceId, TemplateId};
use std::fs;
use std::path::{Path, PathBuf};

const MAX_RESERVE_ATTEMPTS: usize = 16;

/// Creates a fresh directory for one instance under `root`.
///
/// The final directory is created with `create_dir`, so concurrent callers can
/// never be handed the same path.
pub fn reserve_instance_directory(
    root: &Path,
    template: &TemplateId,
) -> Result<(InstanceId, PathBuf), MaterializeError> {
    fs::create_dir_all(root).map_err(|source| MaterializeError::CreateDir {
        path: root.display().to_string(),
        source,
    })?;

    for _ in 0..MAX_RESERVE_ATTEMPTS {
        let id = InstanceId::generate(template, chrono::Utc::now().timestamp())
            .map_err(MaterializeError::InstanceId)?;
        let dir = root.join(id.as_str());
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((id, dir)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(source) => {
                return Err(MaterializeError::CreateDir {
                    path: dir.display().to_string(),
                    source,
                })
            }
        }
    }

    Err(MaterializeError::InstanceId(format!(
        "failed to allocate a unique directory under {} after {} attempts",
        root.display(),
        MAX_RESERVE_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn concurrent_reservations_never_collide() {
        let root = tempdir().expect("tempdir");
        let root_path = Arc::new(root.path().join("projects"));
        let template = TemplateId::parse("web-api").expect("template");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let root_path = root_path.clone();
                let template = template.clone();
                thread::spawn(move || {
                    (0..8)
                        .map(|_| {
                            reserve_instance_directory(&root_path, &template)
                                .expect("reserve")
                                .1
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = BTreeSet::new();
        for handle in handles {
            for dir in handle.join().expect("join") {
                assert!(dir.is_dir());
                assert!(seen.insert(dir));
            }
        }
        assert_eq!(seen.len(), 64);
    }
}
