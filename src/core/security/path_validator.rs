use std::io;
use std::path::{Component, Path, PathBuf};

use crate::core::config::SecurityConfig;

/// Errors that can occur during path validation
#[derive(Debug, thiserror::Error)]
pub enum PathSecurityError {
    #[error("Path '{path}' is outside allowed root directory '{root}'")]
    OutsideRootDirectory { path: PathBuf, root: PathBuf },

    #[error("Symlink '{path}' points outside allowed root directory")]
    SymlinkOutsideRoot { path: PathBuf },

    #[error("Symlinks are not allowed: '{path}'")]
    SymlinkNotAllowed { path: PathBuf },

    #[error("Cannot canonicalize path '{path}': {error}")]
    CannotCanonicalize { path: PathBuf, error: io::Error },

    #[error("Path does not exist: '{path}'")]
    PathNotFound { path: PathBuf },

    #[error("Invalid destination '{path}': {reason}")]
    InvalidDestination { path: PathBuf, reason: &'static str },

    #[error("IO error for path '{path}': {error}")]
    IoError { path: PathBuf, error: io::Error },
}

/// Validates that an existing local path is within the configured root.
///
/// The path is canonicalized so `.`, `..` and symlinks are resolved before
/// the root check. With `allow_symlinks` off, a symlink is rejected outright;
/// with it on, the link is accepted only if its target stays inside the root.
///
/// Without a configured root, the path only has to exist.
///
/// ```rust,ignore
/// let source = validate_path("/srv/box/report.pdf", &config.security)?;
/// ```
pub fn validate_path(input_path: &str, security: &SecurityConfig) -> Result<PathBuf, PathSecurityError> {
    let path = Path::new(input_path);

    let Some(ref root) = security.root_path else {
        return canonicalize_path(path);
    };
    let canonical_root = canonicalize_root(root)?;

    if path.symlink_metadata().is_err() {
        return Err(PathSecurityError::PathNotFound {
            path: path.to_path_buf(),
        });
    }

    if path.is_symlink() {
        if !security.allow_symlinks {
            return Err(PathSecurityError::SymlinkNotAllowed {
                path: path.to_path_buf(),
            });
        }
        let canonical_target = canonicalize_path(path).map_err(|_| PathSecurityError::SymlinkOutsideRoot {
            path: path.to_path_buf(),
        })?;
        if !is_within_root(&canonical_target, &canonical_root) {
            return Err(PathSecurityError::SymlinkOutsideRoot {
                path: path.to_path_buf(),
            });
        }
        return Ok(canonical_target);
    }

    let canonical_path = canonicalize_path(path)?;
    if !is_within_root(&canonical_path, &canonical_root) {
        return Err(PathSecurityError::OutsideRootDirectory {
            path: canonical_path,
            root: canonical_root,
        });
    }

    Ok(canonical_path)
}

/// Validates a path that is about to be written.
///
/// The file itself may not exist yet, so its parent directory is validated
/// with [`validate_path`] and the file name joined back on. The file name must
/// be a plain name; an existing symlink at the destination is rejected unless
/// symlinks are allowed.
pub fn validate_destination(
    input_path: &str,
    security: &SecurityConfig,
) -> Result<PathBuf, PathSecurityError> {
    let path = Path::new(input_path);

    let file_name = match path.components().next_back() {
        Some(Component::Normal(name)) => name.to_owned(),
        _ => {
            return Err(PathSecurityError::InvalidDestination {
                path: path.to_path_buf(),
                reason: "path must end in a file name",
            });
        }
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let parent_str = parent.to_str().ok_or_else(|| PathSecurityError::InvalidDestination {
        path: path.to_path_buf(),
        reason: "path is not valid UTF-8",
    })?;

    let canonical_parent = validate_path(parent_str, security)?;
    if !canonical_parent.is_dir() {
        return Err(PathSecurityError::InvalidDestination {
            path: path.to_path_buf(),
            reason: "parent is not a directory",
        });
    }

    let destination = canonical_parent.join(file_name);
    if destination.is_symlink() && !security.allow_symlinks {
        return Err(PathSecurityError::SymlinkNotAllowed { path: destination });
    }
    Ok(destination)
}

fn canonicalize_root(root: &Path) -> Result<PathBuf, PathSecurityError> {
    root.canonicalize().map_err(|e| PathSecurityError::IoError {
        path: root.to_path_buf(),
        error: e,
    })
}

/// Checks if a path is within (or equal to) a root directory
fn is_within_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

fn canonicalize_path(path: &Path) -> Result<PathBuf, PathSecurityError> {
    path.canonicalize().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            PathSecurityError::PathNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PathSecurityError::CannotCanonicalize {
                path: path.to_path_buf(),
                error: e,
            }
        }
    })
}
