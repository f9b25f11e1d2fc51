use super::{PersistedObject, PersistenceStore};
use crate::error::{StoreError, StoreResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One JSON file per object under `<root>/<scope path>/<name>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the directory for one scope
    pub fn new(root: impl AsRef<Path>, scope_path: &str) -> StoreResult<Self> {
        let mut dir = root.as_ref().to_path_buf();
        for segment in scope_path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(StoreError::InvalidName(scope_path.to_string()));
            }
            dir.push(segment);
        }
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "file store ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, name: &str) -> StoreResult<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

impl PersistenceStore for FileStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn load(&self, name: &str) -> StoreResult<Option<PersistedObject>> {
        let path = self.file_for(name)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, object: &PersistedObject) -> StoreResult<()> {
        let path = self.file_for(&object.name)?;
        let encoded = serde_json::to_string_pretty(object)?;
        // Write then rename so a crash never leaves a truncated file behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> StoreResult<bool> {
        let path = self.file_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn object(name: &str, value: i64) -> PersistedObject {
        let mut attributes = BTreeMap::new();
        attributes.insert("score".to_string(), json!(value));
        PersistedObject {
            name: name.to_string(),
            path: "/game/room1".to_string(),
            version: 7,
            attributes,
        }
    }

    #[test]
    fn test_layout_follows_scope_path() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path(), "/game/room1").unwrap();
        store.save(&object("scores", 10)).unwrap();

        assert!(tmp.path().join("game/room1/scores.json").is_file());
        assert_eq!(store.names().unwrap(), vec!["scores".to_string()]);
    }

    #[test]
    fn test_roundtrip_and_overwrite() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path(), "/game").unwrap();

        store.save(&object("scores", 1)).unwrap();
        store.save(&object("scores", 2)).unwrap();

        let loaded = store.load("scores").unwrap().unwrap();
        assert_eq!(loaded.attributes["score"], json!(2));
        assert_eq!(loaded.version, 7);
    }

    #[test]
    fn test_missing_object() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path(), "/").unwrap();
        assert!(store.load("nope").unwrap().is_none());
        assert!(!store.remove("nope").unwrap());
    }

    #[test]
    fn test_rejects_path_escapes() {
        let tmp = TempDir::new().unwrap();
        assert!(FileStore::new(tmp.path(), "/a/../b").is_err());

        let store = FileStore::new(tmp.path(), "/a").unwrap();
        assert!(matches!(
            store.save(&object("../evil", 1)),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path(), "/").unwrap();
        fs::write(tmp.path().join("broken.json"), "{not json").unwrap();
        assert!(matches!(store.load("broken"), Err(StoreError::Json(_))))
    }
}
