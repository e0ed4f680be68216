// Source discovery
// Recursive, case-insensitive extension match with an exclusion list

use crate::BuildResult;
use std::path::{Path, PathBuf};
use log::debug;

/// Collect files under `folder` whose extension equals `ext` (case-insensitive),
/// skipping any path in `exclude`. Results are sorted; a missing folder yields nothing.
pub fn find_files(folder: &Path, ext: &str, exclude: &[PathBuf]) -> BuildResult<Vec<PathBuf>> {
    let ext = ext.trim_start_matches('.').to_lowercase();
    let excluded: Vec<String> = exclude.iter().map(|p| normalize(p)).collect();

    let mut found = Vec::new();
    if folder.is_dir() {
        walk(folder, &mut found)?;
    } else {
        debug!("{} does not exist, nothing to discover", folder.display());
    }

    found.retain(|path| {
        let matches = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase() == ext)
            .unwrap_or(false);
        matches && !excluded.contains(&normalize(path))
    });
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> BuildResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn normalize(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/").to_lowercase();
    text.trim_start_matches("./").to_string()
}
