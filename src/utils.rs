//! Utility functions for file operations and path manipulation

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Get a unique path for a file, handling collisions according to the specified action
///
/// # Arguments
///
/// * `path` - The desired file path
/// * `action` - How to handle file collisions
///
/// # Returns
///
/// Returns the final path to use. For Rename action, this may have a suffix added.
/// For Skip action, returns [`Error::FileExists`] if the file already exists.
/// For Overwrite action, returns the original path unchanged.
///
/// # Examples
///
/// ```
/// use image_dl::utils::get_unique_path;
/// use image_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/image.jpg");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If /tmp/image.jpg exists, returns /tmp/image (1).jpg
/// // If that exists too, returns /tmp/image (2).jpg, etc.
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.is_file() {
                return Err(Error::FileExists {
                    path: path.to_path_buf(),
                });
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                Error::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "cannot extract file stem".to_string(),
                }
            })?;

            let extension = path.extension().and_then(|e| e.to_str());

            let parent = path.parent().ok_or_else(|| Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "cannot extract parent directory".to_string(),
            })?;

            // Try adding (1), (2), (3), ... until we find a unique name
            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: format!("no free name after {MAX_RENAME_ATTEMPTS} attempts"),
            })
        }
    }
}

/// True if `path` ends with a separator and so cannot name a file
#[must_use]
pub fn is_directory_path(path: &Path) -> bool {
    let raw = path.as_os_str().to_string_lossy();
    raw.is_empty() || raw.ends_with(MAIN_SEPARATOR) || raw.ends_with('/')
}
