use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use shared::AppError;
use tracing::debug;

/// 文字列キーと文字列値の永続化ポート
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove_item(&self, key: &str) -> Result<(), AppError>;
}

/// キーごとに `<dir>/<key>.json` へ保存する
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(AppError::Validation(format!("invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("{}: {}", path.display(), e))),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| AppError::Storage(format!("{}: {}", self.dir.display(), e)))?;
        // 一時ファイルに書いてから置き換える
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)
            .map_err(|e| AppError::Storage(format!("{}: {}", staging.display(), e)))?;
        fs::rename(&staging, &path)
            .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), bytes = value.len(), "Storage item written");
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("{}: {}", path.display(), e))),
        }
    }
}

/// プロセス内だけで保持するストレージ
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppError> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trip_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(temp.path().join("nested"));

        assert_eq!(storage.get_item("auth_cookies").unwrap(), None);
        storage.set_item("auth_cookies", r#"{"a":1}"#).unwrap();
        assert_eq!(
            storage.get_item("auth_cookies").unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert!(temp.path().join("nested/auth_cookies.json").exists());

        storage.remove_item("auth_cookies").unwrap();
        assert_eq!(storage.get_item("auth_cookies").unwrap(), None);
        // 存在しないキーの削除はエラーにしない
        storage.remove_item("auth_cookies").unwrap();
    }

    #[test]
    fn file_storage_overwrite_leaves_no_staging_file() {
        let temp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(temp.path());

        storage.set_item("auth_cookies", r#"{"a":1}"#).unwrap();
        storage.set_item("auth_cookies", r#"{"b":2}"#).unwrap();

        assert_eq!(
            storage.get_item("auth_cookies").unwrap().as_deref(),
            Some(r#"{"b":2}"#)
        );
        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["auth_cookies.json".to_string()]);
    }

    #[test]
    fn file_storage_rejects_path_like_keys() {
        let temp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(temp.path());
        assert!(matches!(
            storage.set_item("../escape", "x"),
            Err(AppError::Validation(_))
        ));
        assert!(storage.get_item("").is_err());
    }

    #[test]
    fn memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        storage.set_item("k", "1").unwrap();
        storage.set_item("k", "2").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("2"));
        storage.remove_item("k").unwrap();
        assert!(storage.get_item("k").unwrap().is_none());
    }
}
