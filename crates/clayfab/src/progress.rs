//! Durable progress files.
//!
//! For an input `X.json` the run writes `X-IN_PROGRESS.json` after every
//! placement (or `X-IN_PROGRESS01.json` ... `X-IN_PROGRESS99.json` when an
//! earlier interrupted run left the plain name behind) and finally
//! `X-DONE.json`. Finishing removes every `X-IN_PROGRESS*` file, so a
//! completed run leaves only the input and its done file.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::FabError;
use crate::fs_safe::{FsSafeError, atomic_write_json};
use crate::run_data::RunData;

pub const IN_PROGRESS_SUFFIX: &str = "-IN_PROGRESS";
pub const DONE_SUFFIX: &str = "-DONE";
const MAX_NUMBERED: u32 = 99;

/// `X` for `X`, `X-IN_PROGRESS`, `X-IN_PROGRESSdd` and `X-DONE`.
pub fn base_stem(stem: &str) -> &str {
    if let Some(base) = stem.strip_suffix(DONE_SUFFIX) {
        return base;
    }
    if let Some(base) = stem.strip_suffix(IN_PROGRESS_SUFFIX) {
        return base;
    }
    let split = stem.len().saturating_sub(2);
    if let (Some(head), Some(digits)) = (stem.get(..split), stem.get(split..))
        && digits.len() == 2
        && digits.bytes().all(|b| b.is_ascii_digit())
        && let Some(base) = head.strip_suffix(IN_PROGRESS_SUFFIX)
    {
        return base;
    }
    stem
}

/// True for `X-IN_PROGRESS` and `X-IN_PROGRESSdd` when `base` is `X`.
fn is_in_progress_of(stem: &str, base: &str) -> bool {
    match stem.strip_prefix(base).and_then(|rest| rest.strip_prefix(IN_PROGRESS_SUFFIX)) {
        Some("") => true,
        Some(digits) => digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Output paths for one run, fixed when the run starts.
#[derive(Clone, Debug)]
pub struct ProgressStore {
    dir: PathBuf,
    base: String,
    in_progress: PathBuf,
    done: PathBuf,
}

impl ProgressStore {
    /// Pick this run's file names next to `input`.
    pub fn for_input(input: &Path) -> Result<Self, FabError> {
        let dir = match input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| FabError::Validation(format!("unusable run data file name: {}", input.display())))?;
        let base = base_stem(stem);

        let plain = dir.join(format!("{}{}.json", base, IN_PROGRESS_SUFFIX));
        let in_progress = if !plain.exists() {
            plain
        } else {
            (1..=MAX_NUMBERED)
                .map(|n| dir.join(format!("{}{}{:02}.json", base, IN_PROGRESS_SUFFIX, n)))
                .find(|p| !p.exists())
                .ok_or_else(|| {
                    FabError::Validation(format!(
                        "all {} in-progress file names for {} are taken",
                        MAX_NUMBERED, base
                    ))
                })?
        };
        let done = dir.join(format!("{}{}.json", base, DONE_SUFFIX));
        debug!("Progress goes to {}", in_progress.display());
        Ok(Self {
            dir,
            base: base.to_string(),
            in_progress,
            done,
        })
    }

    pub fn in_progress_path(&self) -> &Path {
        &self.in_progress
    }

    pub fn done_path(&self) -> &Path {
        &self.done
    }

    /// Atomically replace this run's in-progress file.
    pub fn write(&self, run_data: &RunData) -> Result<(), FsSafeError> {
        atomic_write_json(&self.in_progress, run_data)
    }

    /// Every in-progress file of this input currently on disk, this run's
    /// and those left by earlier runs.
    pub fn in_progress_files(&self) -> Result<Vec<PathBuf>, FsSafeError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| FsSafeError::io("list", &self.dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| FsSafeError::io("list", &self.dir, e))?.path();
            let matches = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| is_in_progress_of(stem, &self.base));
            if matches && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Write the done file, then remove every in-progress file it supersedes.
    pub fn finish(&self, run_data: &RunData) -> Result<PathBuf, FsSafeError> {
        atomic_write_json(&self.done, run_data)?;
        for stale in self.in_progress_files()? {
            std::fs::remove_file(&stale).map_err(|e| FsSafeError::io("remove in-progress file", &stale, e))?;
            debug!("Removed {}", stale.display());
        }
        info!("✅ Run complete, wrote {}", self.done.display());
        Ok(self.done.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_stem() {
        assert_eq!(base_stem("wall"), "wall");
        assert_eq!(base_stem("wall-IN_PROGRESS"), "wall");
        assert_eq!(base_stem("wall-IN_PROGRESS07"), "wall");
        assert_eq!(base_stem("wall-DONE"), "wall");
        assert_eq!(base_stem("wall-IN_PROGRESS7"), "wall-IN_PROGRESS7");
        assert_eq!(base_stem("wall_v2"), "wall_v2");
        assert_eq!(base_stem("ü"), "ü");
    }

    #[test]
    fn test_lowest_unused_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wall.json");
        std::fs::write(&input, "{}").unwrap();

        let store = ProgressStore::for_input(&input).unwrap();
        assert_eq!(store.in_progress_path(), dir.path().join("wall-IN_PROGRESS.json"));

        std::fs::write(dir.path().join("wall-IN_PROGRESS.json"), "{}").unwrap();
        std::fs::write(dir.path().join("wall-IN_PROGRESS01.json"), "{}").unwrap();
        std::fs::write(dir.path().join("wall-IN_PROGRESS03.json"), "{}").unwrap();
        let store = ProgressStore::for_input(&input).unwrap();
        assert_eq!(store.in_progress_path(), dir.path().join("wall-IN_PROGRESS02.json"));
        assert_eq!(store.done_path(), dir.path().join("wall-DONE.json"));
    }

    #[test]
    fn test_resume_from_in_progress_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wall-IN_PROGRESS.json");
        std::fs::write(&input, "{}").unwrap();
        let store = ProgressStore::for_input(&input).unwrap();
        assert_eq!(store.in_progress_path(), dir.path().join("wall-IN_PROGRESS01.json"));
        assert_eq!(store.done_path(), dir.path().join("wall-DONE.json"));
    }

    #[test]
    fn test_finish_removes_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::for_input(&dir.path().join("wall.json")).unwrap();
        let data = RunData::new(vec![]);
        store.write(&data).unwrap();
        assert!(store.in_progress_path().exists());
        let done = store.finish(&data).unwrap();
        assert!(done.exists());
        assert!(!store.in_progress_path().exists());
    }

    #[test]
    fn test_finish_removes_earlier_in_progress_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wall-IN_PROGRESS.json");
        std::fs::write(&input, "{}").unwrap();
        std::fs::write(dir.path().join("wall-IN_PROGRESS04.json"), "{}").unwrap();
        std::fs::write(dir.path().join("wall_v2-IN_PROGRESS.json"), "{}").unwrap();
        std::fs::write(dir.path().join("wall-IN_PROGRESS.txt"), "").unwrap();

        let store = ProgressStore::for_input(&input).unwrap();
        let data = RunData::new(vec![]);
        store.write(&data).unwrap();
        assert_eq!(store.in_progress_files().unwrap().len(), 3);

        store.finish(&data).unwrap();
        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["wall-DONE.json", "wall-IN_PROGRESS.txt", "wall_v2-IN_PROGRESS.json"]);
    }

    #[test]
    fn test_in_progress_names() {
        assert!(is_in_progress_of("wall-IN_PROGRESS", "wall"));
        assert!(is_in_progress_of("wall-IN_PROGRESS12", "wall"));
        assert!(!is_in_progress_of("wall-IN_PROGRESS1", "wall"));
        assert!(!is_in_progress_of("wall-DONE", "wall"));
        assert!(!is_in_progress_of("wall2-IN_PROGRESS", "wall"));
    }
}
