//! Extension source discovery.

use log::warn;
use std::path::{Path, PathBuf};

/// One discovered unit of extension code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceUnit {
    path: PathBuf,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Identifying path; unique key of the owning context.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short display name (file name, or full path when it has none).
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Lists regular files directly under `root` with the recognized extension.
///
/// Non-recursive. Symlinks are followed. The extension is matched ASCII
/// case-insensitively and may be given with or without a leading dot. Results
/// are sorted by path so load order does not depend on directory iteration
/// order. Entries that cannot be inspected are skipped with a warning.
///
/// # Errors
/// - Returns the underlying I/O error when `root` cannot be listed.
pub fn discover_sources(root: &Path, extension: &str) -> std::io::Result<Vec<SourceUnit>> {
    let wanted = normalize_extension(extension);
    let mut units = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                warn!(
                    "event=discover module=extension status=skip root={} error={err}",
                    root.display()
                );
                continue;
            }
        };
        if !has_extension(&path, &wanted) {
            continue;
        }
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => units.push(SourceUnit::new(path)),
            Ok(_) => {}
            Err(err) => warn!(
                "event=discover module=extension status=skip path={} error={err}",
                path.display()
            ),
        }
    }
    units.sort();
    Ok(units)
}

/// Strips a leading dot and lowercases the extension.
pub fn normalize_extension(extension: &str) -> String {
    extension
        .trim()
        .trim_start_matches('.')
        .to_ascii_lowercase()
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| !wanted.is_empty() && ext.eq_ignore_ascii_case(wanted))
}
