use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::errors::StoreError;

/// A JSON document as stored. The store never looks inside it.
pub type Document = serde_json::Value;

/// File extension of every record file.
pub const EXTENSION: &str = "json";

const MAX_SEGMENT_LEN: usize = 128;

/// Create/read/update/delete of JSON documents addressed by `(collection, key)`.
///
/// Implementations give no ordering between concurrent calls on the same
/// identity; each single call is atomic with respect to readers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a new document. Fails with `AlreadyExists` rather than overwrite.
    async fn create(&self, collection: &str, key: &str, document: &Document) -> Result<(), StoreError>;
    /// Raw serialized document at this identity.
    async fn read(&self, collection: &str, key: &str) -> Result<String, StoreError>;
    /// Replace an existing document entirely. Fails with `NotFound` if absent.
    async fn update(&self, collection: &str, key: &str, document: &Document) -> Result<(), StoreError>;
    /// Remove an existing document. Deleting an absent key is `NotFound`.
    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;
    /// Whether a record is present, without reading it.
    async fn exists(&self, collection: &str, key: &str) -> Result<bool, StoreError>;
}

/// Read and deserialize a document in one step.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: &str,
    key: &str,
) -> Result<T, StoreError> {
    let raw = store.read(collection, key).await?;
    serde_json::from_str(&raw).map_err(StoreError::Corrupt)
}

fn identity(collection: &str, key: &str) -> String {
    format!("{collection}/{key}")
}

/// Path segments are limited to a conservative character set and may not
/// start with `.`, which also keeps them apart from in-flight temp files.
fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.len() <= MAX_SEGMENT_LEN
        && !segment.starts_with('.')
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'+' | b'.'))
}

pub(crate) fn validate_identity(collection: &str, key: &str) -> Result<(), StoreError> {
    if is_valid_segment(collection) && is_valid_segment(key) {
        Ok(())
    } else {
        warn!(%collection, %key, "rejected record identity");
        Err(StoreError::InvalidKey(identity(collection, key)))
    }
}

/// File-per-record store rooted at a fixed directory.
///
/// Layout: `{root}/{collection}/{key}.json`. The root is chosen once at
/// construction; tests point it at a temporary directory.
#[derive(Clone, Debug)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    /// Location of a record; validates the identity first.
    pub fn record_path(&self, collection: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_identity(collection, key)?;
        Ok(self.collection_dir(collection).join(format!("{key}.{EXTENSION}")))
    }

    fn temp_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!(".{key}.{}.tmp", Uuid::new_v4().simple()))
    }

    /// Write the full payload to a fresh temp file and flush it to disk.
    /// The temp file is removed again if any step fails.
    async fn write_temp(dir: &Path, key: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let tmp = Self::temp_path(dir, key);
        let written = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            Ok::<_, io::Error>(())
        }
        .await;
        if let Err(e) = written {
            Self::discard_temp(&tmp).await;
            return Err(StoreError::Write(e));
        }
        Ok(tmp)
    }

    async fn discard_temp(tmp: &Path) {
        if let Err(e) = fs::remove_file(tmp).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn create(&self, collection: &str, key: &str, document: &Document) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        let bytes = serde_json::to_vec(document).map_err(StoreError::Serialize)?;
        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir).await.map_err(|e| {
            error!(%collection, error = %e, "cannot create collection directory");
            StoreError::Write(e)
        })?;

        // hard_link publishes the complete file under its final name and
        // fails if that name is taken, so a record is never half-visible.
        let tmp = Self::write_temp(&dir, key, &bytes).await?;
        let linked = fs::hard_link(&tmp, &path).await;
        Self::discard_temp(&tmp).await;
        match linked {
            Ok(()) => {
                debug!(%collection, %key, "record created");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(%collection, %key, "record already exists");
                Err(StoreError::AlreadyExists(identity(collection, key)))
            }
            Err(e) => {
                error!(%collection, %key, error = %e, "failed to publish record");
                Err(StoreError::Write(e))
            }
        }
    }

    async fn read(&self, collection: &str, key: &str) -> Result<String, StoreError> {
        let path = self.record_path(collection, key)?;
        match fs::read_to_string(&path).await {
            Ok(raw) => {
                debug!(%collection, %key, bytes = raw.len(), "record read");
                Ok(raw)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(%collection, %key, "record not found");
                Err(StoreError::NotFound(identity(collection, key)))
            }
            Err(e) => {
                error!(%collection, %key, error = %e, "failed to read record");
                Err(StoreError::Read(e))
            }
        }
    }

    async fn update(&self, collection: &str, key: &str, document: &Document) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(StoreError::Open(io::Error::new(
                    io::ErrorKind::Other,
                    "record path is not a regular file",
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(identity(collection, key)))
            }
            Err(e) => {
                error!(%collection, %key, error = %e, "failed to open record for update");
                return Err(StoreError::Open(e));
            }
        }
        let bytes = serde_json::to_vec(document).map_err(StoreError::Serialize)?;

        // Replace through rename: readers see the old or the new document,
        // never a truncated one.
        let tmp = Self::write_temp(&self.collection_dir(collection), key, &bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            error!(%collection, %key, error = %e, "failed to replace record");
            Self::discard_temp(&tmp).await;
            return Err(StoreError::Write(e));
        }
        debug!(%collection, %key, "record replaced");
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%collection, %key, "record deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(identity(collection, key)))
            }
            Err(e) => {
                error!(%collection, %key, error = %e, "failed to delete record");
                Err(StoreError::Delete(e))
            }
        }
    }

    async fn exists(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        let path = self.record_path(collection, key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Read(e)),
        }
    }
}

/// Simple in-memory store for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryRecordStore {
        records: Mutex<HashMap<(String, String), String>>, // key: (collection, key)
        fail_writes: AtomicBool,
    }

    impl MemoryRecordStore {
        /// Make every create/update/delete fail with an I/O error.
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        fn check_writable(&self) -> Result<(), io::Error> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "writes disabled"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RecordStore for MemoryRecordStore {
        async fn create(&self, collection: &str, key: &str, document: &Document) -> Result<(), StoreError> {
            validate_identity(collection, key)?;
            self.check_writable().map_err(StoreError::Write)?;
            let raw = serde_json::to_string(document).map_err(StoreError::Serialize)?;
            let mut records = self.records.lock().unwrap();
            let id = (collection.to_string(), key.to_string());
            if records.contains_key(&id) {
                return Err(StoreError::AlreadyExists(identity(collection, key)));
            }
            records.insert(id, raw);
            Ok(())
        }

        async fn read(&self, collection: &str, key: &str) -> Result<String, StoreError> {
            validate_identity(collection, key)?;
            let records = self.records.lock().unwrap();
            records
                .get(&(collection.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| StoreError::NotFound(identity(collection, key)))
        }

        async fn update(&self, collection: &str, key: &str, document: &Document) -> Result<(), StoreError> {
            validate_identity(collection, key)?;
            self.check_writable().map_err(StoreError::Write)?;
            let raw = serde_json::to_string(document).map_err(StoreError::Serialize)?;
            let mut records = self.records.lock().unwrap();
            match records.get_mut(&(collection.to_string(), key.to_string())) {
                Some(slot) => {
                    *slot = raw;
                    Ok(())
                }
                None => Err(StoreError::NotFound(identity(collection, key))),
            }
        }

        async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
            validate_identity(collection, key)?;
            self.check_writable().map_err(StoreError::Delete)?;
            let mut records = self.records.lock().unwrap();
            records
                .remove(&(collection.to_string(), key.to_string()))
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound(identity(collection, key)))
        }

        async fn exists(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
            validate_identity(collection, key)?;
            let records = self.records.lock().unwrap();
            Ok(records.contains_key(&(collection.to_string(), key.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TempDataDir;
    use serde_json::json;

    #[tokio::test]
    async fn create_then_read_round_trips() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_round_trip");
        let store = FileRecordStore::new(dir.path());
        let doc = json!({"firstName": "John", "nested": {"n": 1, "list": [true, null]}});

        store.create("users", "5551234", &doc).await?;
        let raw = store.read("users", "5551234").await?;
        let back: Document = serde_json::from_str(&raw)?;
        assert_eq!(back, doc);

        let expected = dir.path().join("users").join("5551234.json");
        assert_eq!(store.record_path("users", "5551234")?, expected);
        assert!(tokio::fs::metadata(&expected).await?.is_file());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_create_keeps_original() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_duplicate");
        let store = FileRecordStore::new(dir.path());
        store.create("users", "5551234", &json!({"v": 1})).await?;

        let err = store.create("users", "5551234", &json!({"v": 2})).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let current: Document = read_json(&store, "users", "5551234").await?;
        assert_eq!(current, json!({"v": 1}));
        Ok(())
    }

    #[tokio::test]
    async fn missing_identity_is_not_found_without_side_effects() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_missing");
        let store = FileRecordStore::new(dir.path());

        assert!(store.read("users", "5550000").await.unwrap_err().is_not_found());
        assert!(store.update("users", "5550000", &json!({"v": 1})).await.unwrap_err().is_not_found());
        assert!(store.delete("users", "5550000").await.unwrap_err().is_not_found());
        assert!(!store.exists("users", "5550000").await?);
        // update on a missing record must not create it
        assert!(store.read("users", "5550000").await.unwrap_err().is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn update_replaces_whole_document() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_replace");
        let store = FileRecordStore::new(dir.path());
        store.create("users", "5551234", &json!({"a": 1, "only_old": "x"})).await?;

        store.update("users", "5551234", &json!({"a": 2, "only_new": true})).await?;
        let current: Document = read_json(&store, "users", "5551234").await?;
        assert_eq!(current, json!({"a": 2, "only_new": true}));
        assert!(current.get("only_old").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn delete_then_read_is_not_found() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_delete");
        let store = FileRecordStore::new(dir.path());
        store.create("users", "5551234", &json!({})).await?;
        assert!(store.exists("users", "5551234").await?);

        store.delete("users", "5551234").await?;
        assert!(store.read("users", "5551234").await.unwrap_err().is_not_found());
        // deleting twice is an error, not a no-op
        assert!(store.delete("users", "5551234").await.unwrap_err().is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn collections_are_separate_namespaces() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_namespaces");
        let store = FileRecordStore::new(dir.path());
        store.create("users", "k1", &json!({"c": "users"})).await?;
        store.create("tokens", "k1", &json!({"c": "tokens"})).await?;

        let users: Document = read_json(&store, "users", "k1").await?;
        let tokens: Document = read_json(&store, "tokens", "k1").await?;
        assert_eq!(users["c"], "users");
        assert_eq!(tokens["c"], "tokens");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_identities_rejected() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_invalid");
        let store = FileRecordStore::new(dir.path());
        let bad = [("users", ""), ("users", ".."), ("users", "../etc"), ("", "k"), ("a/b", "k"), ("users", ".hidden")];
        for (collection, key) in bad {
            let err = store.create(collection, key, &json!({})).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey(_)), "{collection:?}/{key:?}");
            assert!(matches!(store.read(collection, key).await.unwrap_err(), StoreError::InvalidKey(_)));
        }
        assert!(tokio::fs::metadata(dir.path()).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_temp_cleanup");
        let store = FileRecordStore::new(dir.path());
        store.create("users", "5551234", &json!({"v": 1})).await?;
        let _ = store.create("users", "5551234", &json!({"v": 2})).await;
        store.update("users", "5551234", &json!({"v": 3})).await?;

        let mut entries = tokio::fs::read_dir(dir.path().join("users")).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["5551234.json".to_string()]);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_update_keeps_old_document() -> Result<(), anyhow::Error> {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDataDir::new("store_update_fails");
        let store = FileRecordStore::new(dir.path());
        store.create("users", "5551234", &json!({"v": 1})).await?;

        let users = dir.path().join("users");
        tokio::fs::set_permissions(&users, std::fs::Permissions::from_mode(0o555)).await?;
        // root ignores directory permissions; nothing to observe then
        let writable = tokio::fs::write(users.join("_canary"), b"").await.is_ok();
        let result = store.update("users", "5551234", &json!({"v": 2})).await;
        tokio::fs::set_permissions(&users, std::fs::Permissions::from_mode(0o755)).await?;
        if writable {
            return Ok(());
        }

        assert!(matches!(result, Err(StoreError::Write(_))), "{result:?}");
        let current: Document = read_json(&store, "users", "5551234").await?;
        assert_eq!(current, json!({"v": 1}));

        let mut entries = tokio::fs::read_dir(&users).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            assert!(!name.ends_with(".tmp"), "leftover temp file {name}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_document_surfaces_on_read_json() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_corrupt");
        let store = FileRecordStore::new(dir.path());
        tokio::fs::create_dir_all(dir.path().join("users")).await?;
        tokio::fs::write(dir.path().join("users").join("5551234.json"), b"{not json").await?;

        let raw = store.read("users", "5551234").await?;
        assert_eq!(raw, "{not json");
        let err = read_json::<Document>(&store, "users", "5551234").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_creates_have_one_winner() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("store_race");
        let store = std::sync::Arc::new(FileRecordStore::new(dir.path()));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create("users", "5551234", &json!({"writer": i})).await
            }));
        }
        let mut created = 0;
        for h in handles {
            match h.await? {
                Ok(()) => created += 1,
                Err(StoreError::AlreadyExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        assert_eq!(created, 1);
        Ok(())
    }

    #[tokio::test]
    async fn memory_store_matches_file_contract() -> Result<(), anyhow::Error> {
        let store = mock::MemoryRecordStore::default();
        store.create("users", "k", &json!({"v": 1})).await?;
        assert!(matches!(store.create("users", "k", &json!({})).await.unwrap_err(), StoreError::AlreadyExists(_)));
        store.update("users", "k", &json!({"v": 2})).await?;
        let v: Document = read_json(&store, "users", "k").await?;
        assert_eq!(v, json!({"v": 2}));

        store.fail_writes(true);
        assert!(matches!(store.update("users", "k", &json!({})).await.unwrap_err(), StoreError::Write(_)));
        store.fail_writes(false);

        store.delete("users", "k").await?;
        assert!(store.delete("users", "k").await.unwrap_err().is_not_found());
        Ok(())
    }
}
