use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

/// Regular files in `dir` with the given extension, sorted by path
pub(crate) fn input_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, anyhow::Error> {
    if !dir.is_dir() {
        return Err(anyhow!("Input directory {} does not exist or is not a directory", dir.to_string_lossy()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("path: {}", dir.to_string_lossy()))? {
        let path = entry.with_context(|| format!("path: {}", dir.to_string_lossy()))?.path();
        let matches = path.extension().map_or(false, |e| e == extension);
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Split the sorted file list into consecutive groups of at most `fan_in` files
pub(crate) fn partition(files: Vec<PathBuf>, fan_in: usize) -> Vec<Vec<PathBuf>> {
    files.chunks(fan_in.max(1)).map(|group| group.to_vec()).collect()
}
