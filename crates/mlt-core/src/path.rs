//! Path rebasing against a bag's data directory.
//!
//! Kept as a first-class primitive rather than a codec concern so every
//! serializer observes the same rules.

use std::path::{Path, PathBuf};

/// Resolve a possibly-relative path against a base directory, producing the
/// absolute form recorded internally by a property bag.
pub fn absolutize(path: &str, base_dir: Option<&Path>) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match base_dir {
        Some(base) => base.join(p),
        None => p.to_path_buf(),
    }
}

/// Produce the form serialized to disk: relative to `base_dir` when the
/// absolute path lives under it, otherwise left absolute.
pub fn relativize(path: &Path, base_dir: Option<&Path>) -> String {
    if let Some(base) = base_dir {
        if let Ok(rel) = path.strip_prefix(base) {
            return rel.to_string_lossy().into_owned();
        }
    }
    path.to_string_lossy().into_owned()
}
