use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::types::VideoEntry;
use crate::file_utils::is_video_file;

pub struct ScanProgress {
    pub percent: u32,
    pub message: String,
}

/// Recursively walks `root`, collecting every file whose extension or MIME
/// class marks it as video. Per-directory read errors are logged and
/// skipped rather than aborting the whole scan. `dir_index`/`total_dirs`
/// locate `root` within the caller's full (regular + seasonal) directory
/// list, so `percent` advances as each configured directory is scanned
/// rather than staying pinned at a constant.
pub fn scan_directory(
    root: &str,
    extra_extensions: &[String],
    seasonal_directory: Option<&str>,
    dir_index: usize,
    total_dirs: usize,
    mut on_progress: impl FnMut(ScanProgress),
) -> Vec<VideoEntry> {
    let mut entries = Vec::new();
    let percent = ((dir_index * 100) / total_dirs.max(1)) as u32;
    let root_path = Path::new(root);
    if !root_path.exists() {
        tracing::warn!(directory = %root, "configured directory does not exist, skipping");
        return entries;
    }

    let mut stack = vec![root_path.to_path_buf()];
    let mut dirs_visited: u32 = 0;

    while let Some(dir) = stack.pop() {
        dirs_visited += 1;
        on_progress(ScanProgress {
            percent,
            message: format!("scanning {}", dir.display()),
        });

        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(err) => {
                tracing::warn!(directory = %dir.display(), error = %err, "failed to read directory during scan, skipping");
                continue;
            }
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_video_file(&path, extra_extensions) {
                continue;
            }

            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let directory = path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();

            entries.push(VideoEntry {
                original_path: path.to_string_lossy().into_owned(),
                filename,
                directory,
                added_at: now_ms(),
                seasonal_directory: seasonal_directory.map(str::to_string),
            });
        }
    }

    tracing::debug!(directory = %root, dirs_visited, found = entries.len(), "directory scan complete");
    entries
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_finds_nested_video_files_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        fs::write(dir.path().join("sub").join("b.mkv"), b"x").unwrap();
        fs::write(dir.path().join("readme.txt"), b"x").unwrap();

        let entries = scan_directory(dir.path().to_str().unwrap(), &[], None, 0, 1, |_| {});
        assert_eq!(entries.len(), 2);
        let names: Vec<_> = entries.iter().map(|e| e.filename.clone()).collect();
        assert!(names.contains(&"a.mp4".to_string()));
        assert!(names.contains(&"b.mkv".to_string()));
    }

    #[test]
    fn missing_directory_returns_empty_without_panicking() {
        let entries = scan_directory("/definitely/does/not/exist", &[], None, 0, 1, |_| {});
        assert!(entries.is_empty());
    }

    #[test]
    fn tags_entries_with_seasonal_directory_when_provided() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        let entries = scan_directory(dir.path().to_str().unwrap(), &[], Some("winter"), 0, 1, |_| {});
        assert_eq!(entries[0].seasonal_directory.as_deref(), Some("winter"));
    }

    #[test]
    fn percent_advances_across_configured_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"x").unwrap();

        let mut percents = Vec::new();
        scan_directory(dir.path().to_str().unwrap(), &[], None, 1, 4, |p| {
            percents.push(p.percent);
        });
        assert_eq!(percents, vec![25]);
    }
}
