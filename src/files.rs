//! Expands path arguments into the list of files attached to an upload.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{UpError, UpResult};

/// Collect every file named by `args`, descending into directories.
///
/// The first missing path or traversal error aborts the whole collection.
/// Entries keep traversal order and are not deduplicated, so overlapping
/// arguments attach the same file more than once.
pub fn gather_files<P: AsRef<Path>>(args: &[P]) -> UpResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for arg in args {
        let arg = arg.as_ref();
        let metadata = fs::metadata(arg).map_err(|source| match source.kind() {
            ErrorKind::NotFound => UpError::NotFound {
                path: arg.to_path_buf(),
            },
            _ => UpError::Stat {
                path: arg.to_path_buf(),
                source,
            },
        })?;
        let root = fs::canonicalize(arg).map_err(|source| UpError::Stat {
            path: arg.to_path_buf(),
            source,
        })?;

        if metadata.is_dir() {
            collect_dir(&root, &mut files)?;
        } else {
            files.push(root);
        }
    }

    debug!("Collected {} file(s) from {} argument(s)", files.len(), args.len());
    Ok(files)
}

fn collect_dir(root: &Path, files: &mut Vec<PathBuf>) -> UpResult<()> {
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| UpError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    Ok(())
}
