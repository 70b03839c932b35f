use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("sync key is empty")]
    Empty,
    #[error("sync key contains unsupported component: {0}")]
    UnsupportedComponent(String),
    #[error("{path} is not under {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),
}

/// Maps a POSIX sync key ("gba/pokemon.srm") under a category root.
pub fn local_path_for(root: &Path, key: &str) -> Result<PathBuf, PathError> {
    if key.is_empty() {
        return Err(PathError::Empty);
    }

    let mut out = root.to_path_buf();
    let mut pushed = false;
    for part in key.split('/') {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (None, _) | (Some(Component::CurDir), None) => continue,
            (Some(Component::Normal(segment)), None) => {
                out.push(segment);
                pushed = true;
            }
            _ => return Err(PathError::UnsupportedComponent(key.to_string())),
        }
    }
    if !pushed {
        return Err(PathError::Empty);
    }
    Ok(out)
}

/// Inverse of [`local_path_for`]: the `/`-joined path of `path` relative to `root`.
pub fn sync_key_for(root: &Path, path: &Path) -> Result<String, PathError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| PathError::NonUtf8(path.to_path_buf()))?,
            ),
            Component::CurDir => continue,
            _ => {
                return Err(PathError::UnsupportedComponent(
                    relative.display().to_string(),
                ));
            }
        }
    }
    if parts.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(parts.join("/"))
}
