//! Directory-backed record storage used as the checkpoint between stages.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::records::RECORD_EXTENSION;

/// Reads and writes per-document JSON records keyed by file name.
///
/// Implementors supply raw byte access; listing rules, JSON parsing and
/// pretty-printing live in the provided methods so every backend agrees on
/// them.
pub trait RecordStore: Send + Sync {
    /// Whether `dir` exists.
    fn dir_exists(&self, dir: &Path) -> bool;

    /// File names directly inside `dir`, in any order.
    fn entries(&self, dir: &Path) -> Result<Vec<String>>;

    /// Raw file content.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replaces the file at `path`, creating parent directories first.
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Sorted `.json` file names in `dir`.
    ///
    /// Fails with `DirectoryNotFound` or `EmptyInput`; both abort the run.
    fn list_inputs(&self, dir: &Path) -> Result<Vec<String>> {
        if !self.dir_exists(dir) {
            return Err(PipelineError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }
        let mut names: Vec<String> = self
            .entries(dir)?
            .into_iter()
            .filter(|name| has_record_extension(name))
            .collect();
        if names.is_empty() {
            return Err(PipelineError::EmptyInput {
                path: dir.to_path_buf(),
            });
        }
        names.sort();
        debug!(dir = %dir.display(), count = names.len(), "listed record files");
        Ok(names)
    }

    /// Parses `dir/name` as JSON.
    fn read_record(&self, dir: &Path, name: &str) -> Result<Value> {
        let path = dir.join(name);
        let bytes = self.read_bytes(&path)?;
        serde_json::from_slice(&bytes).map_err(|source| PipelineError::Json { path, source })
    }

    /// Writes `value` as two-space pretty JSON to `dir/name`, overwriting.
    fn write_record(&self, dir: &Path, name: &str, value: &Value) -> Result<PathBuf> {
        let path = dir.join(name);
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| PipelineError::Json {
            path: path.clone(),
            source,
        })?;
        self.write_bytes(&path, &bytes)?;
        Ok(path)
    }
}

fn has_record_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(RECORD_EXTENSION))
}

/// Record store over the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRecordStore;

impl RecordStore for FsRecordStore {
    fn dir_exists(&self, dir: &Path) -> bool {
        dir.is_dir()
    }

    fn entries(&self, dir: &Path) -> Result<Vec<String>> {
        let reader = fs::read_dir(dir).map_err(|err| PipelineError::io(dir, err))?;
        let mut names = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|err| PipelineError::io(dir, err))?;
            let is_file = entry
                .file_type()
                .map_err(|err| PipelineError::io(entry.path(), err))?
                .is_file();
            if !is_file {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) if has_record_extension(&raw.to_string_lossy()) => {
                    return Err(PipelineError::io(
                        entry.path(),
                        std::io::Error::new(
                            ErrorKind::InvalidData,
                            "record file name is not valid UTF-8",
                        ),
                    ));
                }
                Err(_) => {
                    warn!(path = %entry.path().display(), "ignoring non-UTF-8 file name");
                }
            }
        }
        Ok(names)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|err| PipelineError::io(path, err))
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
        }
        fs::write(path, bytes).map_err(|err| PipelineError::io(path, err))
    }
}

/// In-process record store so stages can be chained without touching disk.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    inner: Mutex<MemoryFiles>,
}

#[derive(Debug, Default)]
struct MemoryFiles {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty directory.
    pub fn create_dir(&self, dir: impl Into<PathBuf>) {
        self.lock().dirs.insert(dir.into());
    }

    /// Seeds a file, registering its parent directory.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut guard = self.lock();
        if let Some(parent) = path.parent() {
            guard.dirs.insert(parent.to_path_buf());
        }
        guard.files.insert(path, bytes.into());
    }

    /// Snapshot of the files stored under `dir`.
    pub fn files_in(&self, dir: &Path) -> BTreeMap<String, Vec<u8>> {
        self.lock()
            .files
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .filter_map(|(path, bytes)| {
                let name = path.file_name()?.to_str()?.to_owned();
                Some((name, bytes.clone()))
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryFiles> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordStore for MemoryRecordStore {
    fn dir_exists(&self, dir: &Path) -> bool {
        self.lock().dirs.contains(dir)
    }

    fn entries(&self, dir: &Path) -> Result<Vec<String>> {
        Ok(self.files_in(dir).into_keys().collect())
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.lock().files.get(path).cloned().ok_or_else(|| {
            PipelineError::io(path, std::io::Error::from(ErrorKind::NotFound))
        })
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_directory_is_fatal() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = FsRecordStore
            .list_inputs(&tmp.path().join("absent"))
            .expect_err("missing dir");
        assert!(matches!(err, PipelineError::DirectoryNotFound { .. }));
    }

    #[test]
    fn directory_without_json_is_empty_input() {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(tmp.path().join("notes.txt"), "x").expect("write");
        fs::create_dir(tmp.path().join("nested.json")).expect("mkdir");
        let err = FsRecordStore.list_inputs(tmp.path()).expect_err("no json");
        assert!(matches!(err, PipelineError::EmptyInput { .. }));
    }

    #[test]
    fn lists_json_case_insensitively_and_sorted() {
        let tmp = tempfile::tempdir().expect("tempdir");
        for name in ["b.json", "A.JSON", "c.txt", "a.Json"] {
            fs::write(tmp.path().join(name), "{}").expect("write");
        }
        let names = FsRecordStore.list_inputs(tmp.path()).expect("list");
        assert_eq!(names, vec!["A.JSON", "a.Json", "b.json"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_record_name_fails_listing() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(tmp.path().join("ok.json"), "{}").expect("write ok");
        fs::write(tmp.path().join(OsStr::from_bytes(b"bad\xff.json")), "{}")
            .expect("write bad");
        let err = FsRecordStore
            .list_inputs(tmp.path())
            .expect_err("lossy name");
        assert!(matches!(
            err,
            PipelineError::Io { ref path, .. } if path.to_string_lossy().contains("bad")
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_name_without_record_extension_is_ignored() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(tmp.path().join("ok.json"), "{}").expect("write ok");
        fs::write(tmp.path().join(OsStr::from_bytes(b"notes\xff.txt")), "x").expect("write");
        assert_eq!(FsRecordStore.list_inputs(tmp.path()).expect("list"), vec!["ok.json"]);
    }

    #[test]
    fn write_creates_directory_and_overwrites() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = tmp.path().join("out").join("deeper");
        FsRecordStore
            .write_record(&out, "x.json", &json!({ "v": 1 }))
            .expect("first write");
        FsRecordStore
            .write_record(&out, "x.json", &json!({ "v": 2 }))
            .expect("second write");
        let value = FsRecordStore.read_record(&out, "x.json").expect("read");
        assert_eq!(value, json!({ "v": 2 }));
        let raw = fs::read_to_string(out.join("x.json")).expect("raw");
        assert_eq!(raw, "{\n  \"v\": 2\n}");
    }

    #[test]
    fn invalid_json_names_the_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(tmp.path().join("broken.json"), "{not json").expect("write");
        let err = FsRecordStore
            .read_record(tmp.path(), "broken.json")
            .expect_err("bad json");
        assert!(err.to_string().contains("broken.json"));
        assert!(err.is_record_error());
    }

    #[test]
    fn memory_store_mirrors_filesystem_rules() {
        let store = MemoryRecordStore::new();
        let dir = Path::new("corpus");
        assert!(matches!(
            store.list_inputs(dir),
            Err(PipelineError::DirectoryNotFound { .. })
        ));
        store.create_dir(dir);
        assert!(matches!(
            store.list_inputs(dir),
            Err(PipelineError::EmptyInput { .. })
        ));
        store.insert("corpus/b.json", "{}");
        store.insert("corpus/a.json", "{}");
        store.insert("corpus/sub/c.json", "{}");
        assert_eq!(store.list_inputs(dir).expect("list"), vec!["a.json", "b.json"]);
    }
}
