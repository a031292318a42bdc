//! File-backed record store
//!
//! One YAML file per record. Layout under the base directory:
//!
//! ```text
//! <base>/<dataset>/<key>.<ext>                          flat datasets
//! <base>/entities/<collectionId>/<key>.<ext>             entities
//! <base>/releases/collections/<collectionId>/<key>.<ext> collection releases
//! <base>/releases/entities/<entityId>/<key>.<ext>        entity releases
//! ```
//!
//! Every write goes through `<path>.tmp` followed by a rename, and every operation on
//! a record path holds that path's lock (see [`lock::LockManager`]).

pub mod lock;

use crate::core::error::{StoreError, StoreResult};
use crate::model::{Collection, Entity, Policy, ReleaseChannel, ReleaseRecord};
use lock::LockManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Which kind of release a release record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
  Collection,
  Entity,
}

/// A named group of records sharing a directory layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dataset {
  /// Flat dataset: `<base>/<name>/<key>.<ext>`
  Named(String),
  /// Entities, partitioned by collection id
  Entities,
  /// Release records, partitioned by owner id
  Releases(ReleaseKind),
}

impl Dataset {
  /// Dataset by directory name. `entities` always means the partitioned entity dataset.
  pub fn named(name: impl Into<String>) -> Self {
    let name = name.into();
    if name == "entities" {
      return Dataset::Entities;
    }
    Dataset::Named(name)
  }

  pub fn collections() -> Self {
    Dataset::named("collections")
  }

  pub fn policies() -> Self {
    Dataset::named("policies")
  }

  pub fn release_channels() -> Self {
    Dataset::named("release-channels")
  }

  pub fn entities() -> Self {
    Dataset::Entities
  }

  pub fn collection_releases() -> Self {
    Dataset::Releases(ReleaseKind::Collection)
  }

  pub fn entity_releases() -> Self {
    Dataset::Releases(ReleaseKind::Entity)
  }

  /// Directory of this dataset relative to the store base
  pub fn relative_dir(&self) -> PathBuf {
    match self {
      Dataset::Named(name) => PathBuf::from(name),
      Dataset::Entities => PathBuf::from("entities"),
      Dataset::Releases(ReleaseKind::Collection) => Path::new("releases").join("collections"),
      Dataset::Releases(ReleaseKind::Entity) => Path::new("releases").join("entities"),
    }
  }

  /// Partitioned datasets keep records one directory level below the dataset root
  pub fn is_partitioned(&self) -> bool {
    !matches!(self, Dataset::Named(_))
  }
}

impl fmt::Display for Dataset {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Dataset::Named(name) => write!(f, "{}", name),
      Dataset::Entities => write!(f, "entities"),
      Dataset::Releases(ReleaseKind::Collection) => write!(f, "releases/collections"),
      Dataset::Releases(ReleaseKind::Entity) => write!(f, "releases/entities"),
    }
  }
}

/// A record type the store can persist
pub trait Record: Serialize + DeserializeOwned + Clone + PartialEq {
  /// Primary identifier, used as the default key
  fn id(&self) -> &str;

  /// Human-readable name, if the record has one
  fn name(&self) -> Option<&str> {
    None
  }

  /// Owning id used as the subdirectory in partitioned datasets
  fn partition(&self) -> Option<&str> {
    None
  }

  /// Release sub-dataset this record belongs in, for release records only
  fn release_kind(&self) -> Option<ReleaseKind> {
    None
  }
}

impl Record for Collection {
  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> Option<&str> {
    Some(&self.name)
  }
}

impl Record for Entity {
  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> Option<&str> {
    Some(&self.name)
  }

  fn partition(&self) -> Option<&str> {
    Some(&self.collection_id)
  }
}

impl Record for Policy {
  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> Option<&str> {
    Some(&self.name)
  }
}

impl Record for ReleaseChannel {
  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> Option<&str> {
    Some(&self.name)
  }
}

impl Record for ReleaseRecord {
  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> Option<&str> {
    Some(&self.name)
  }

  fn partition(&self) -> Option<&str> {
    self.entity_id.as_deref().or(Some(&self.collection_id))
  }

  fn release_kind(&self) -> Option<ReleaseKind> {
    if self.is_entity_release() {
      Some(ReleaseKind::Entity)
    } else {
      Some(ReleaseKind::Collection)
    }
  }
}

/// Per-key YAML record store
#[derive(Debug)]
pub struct Store {
  base_dir: PathBuf,
  extension: String,
  locks: LockManager,
}

impl Store {
  /// Open a store rooted at `base_dir`, creating the directory if needed.
  ///
  /// `extension` is `yml` when given as `yml`/`.yml`; anything else means `yaml`.
  pub fn open(base_dir: impl Into<PathBuf>, extension: &str) -> StoreResult<Self> {
    let base_dir = base_dir.into();
    fs::create_dir_all(&base_dir).map_err(|e| StoreError::io(&base_dir, e))?;
    // Lock keys are derived from this path, so resolve symlinks and `..` once up front.
    let base_dir = fs::canonicalize(&base_dir).map_err(|e| StoreError::io(&base_dir, e))?;

    let ext = extension.trim().trim_start_matches('.');
    let extension = if ext == "yml" { "yml" } else { "yaml" }.to_string();

    tracing::debug!(base_dir = %base_dir.display(), %extension, "opened record store");
    Ok(Self {
      base_dir,
      extension,
      locks: LockManager::new(),
    })
  }

  pub fn base_dir(&self) -> &Path {
    &self.base_dir
  }

  pub fn extension(&self) -> &str {
    &self.extension
  }

  /// Absolute directory of a dataset
  pub fn dataset_dir(&self, dataset: &Dataset) -> PathBuf {
    self.base_dir.join(dataset.relative_dir())
  }

  /// Resolve where `record` lives when stored under `key`
  pub fn record_path<T: Record>(&self, dataset: &Dataset, record: &T, key: &str) -> StoreResult<PathBuf> {
    if let Dataset::Named(name) = dataset
      && !is_safe_segment(name)
    {
      return Err(StoreError::InvalidKey {
        dataset: dataset.to_string(),
        key: name.clone(),
      });
    }

    match dataset {
      Dataset::Named(name) if name == "releases" => {
        return Err(StoreError::WrongDataset {
          dataset: dataset.to_string(),
          key: key.to_string(),
          expected: "releases/collections or releases/entities".to_string(),
        });
      }
      Dataset::Releases(kind) if record.release_kind() != Some(*kind) => {
        let expected = match record.release_kind() {
          Some(ReleaseKind::Entity) => Dataset::entity_releases().to_string(),
          Some(ReleaseKind::Collection) => Dataset::collection_releases().to_string(),
          None => "a non-release dataset".to_string(),
        };
        return Err(StoreError::WrongDataset {
          dataset: dataset.to_string(),
          key: key.to_string(),
          expected,
        });
      }
      _ => {}
    }

    if !is_safe_segment(key) {
      return Err(StoreError::InvalidKey {
        dataset: dataset.to_string(),
        key: key.to_string(),
      });
    }

    let mut dir = self.dataset_dir(dataset);
    if dataset.is_partitioned() {
      let partition = record.partition().unwrap_or_default();
      if !is_safe_segment(partition) {
        return Err(StoreError::MissingPartition {
          dataset: dataset.to_string(),
          key: key.to_string(),
        });
      }
      dir.push(partition);
    }

    Ok(dir.join(format!("{}.{}", key, self.extension)))
  }

  // ---------------------------------------------------------------------------
  // Queries
  // ---------------------------------------------------------------------------

  /// First record matching `predicate`, or `None`
  pub fn find<T, P>(&self, dataset: &Dataset, predicate: P) -> StoreResult<Option<T>>
  where
    T: Record,
    P: Fn(&T) -> bool,
  {
    Ok(self.locate(dataset, predicate)?.map(|(_, record)| record))
  }

  /// All records of a dataset
  pub fn list<T: Record>(&self, dataset: &Dataset) -> StoreResult<Vec<T>> {
    self.list_where(dataset, |_: &T| true)
  }

  /// All records of a dataset matching `predicate`
  pub fn list_where<T, P>(&self, dataset: &Dataset, predicate: P) -> StoreResult<Vec<T>>
  where
    T: Record,
    P: Fn(&T) -> bool,
  {
    let mut out = Vec::new();
    for path in self.record_files(dataset)? {
      if let Some(record) = self.read_locked::<T>(&path)?
        && predicate(&record)
      {
        out.push(record);
      }
    }
    Ok(out)
  }

  /// Record with the given id
  pub fn find_by_id<T: Record>(&self, dataset: &Dataset, id: &str) -> StoreResult<Option<T>> {
    self.find(dataset, |r: &T| r.id() == id)
  }

  /// Resolve an id-or-name to an id: exact id match first, then case-insensitive name
  pub fn resolve_id<T: Record>(&self, dataset: &Dataset, id_or_name: &str) -> StoreResult<Option<String>> {
    let records: Vec<T> = self.list(dataset)?;
    if let Some(record) = records.iter().find(|r| r.id() == id_or_name) {
      return Ok(Some(record.id().to_string()));
    }
    let wanted = id_or_name.to_lowercase();
    Ok(
      records
        .iter()
        .find(|r| r.name().is_some_and(|n| n.to_lowercase() == wanted))
        .map(|r| r.id().to_string()),
    )
  }

  // ---------------------------------------------------------------------------
  // Mutations
  // ---------------------------------------------------------------------------

  /// Insert a new record. Fails with `DuplicateKey` if the target file exists.
  pub fn insert<T, K>(&self, dataset: &Dataset, record: &T, key_fn: K) -> StoreResult<()>
  where
    T: Record,
    K: Fn(&T) -> String,
  {
    let key = key_fn(record);
    let path = self.record_path(dataset, record, &key)?;
    let contents = self.encode(dataset, record)?;

    self.locks.with_path(&path, || {
      if path.exists() {
        tracing::warn!(%dataset, %key, "insert rejected: key already exists");
        return Err(StoreError::DuplicateKey {
          dataset: dataset.to_string(),
          key: key.clone(),
        });
      }
      write_atomic(&path, &contents)?;
      tracing::debug!(%dataset, %key, path = %path.display(), "inserted record");
      Ok(())
    })
  }

  /// Insert keyed by the record id
  pub fn insert_record<T: Record>(&self, dataset: &Dataset, record: &T) -> StoreResult<()> {
    self.insert(dataset, record, |r: &T| r.id().to_string())
  }

  /// Apply `mutate` to the record whose key equals `key`. Returns false if none exists.
  ///
  /// The record is located first, then its file is locked and re-read, so the
  /// mutation always sees the latest committed version. If the mutation changes
  /// the key or partition, the record is moved under both locks.
  pub fn update<T, K, M>(&self, dataset: &Dataset, key_fn: K, key: &str, mutate: M) -> StoreResult<bool>
  where
    T: Record,
    K: Fn(&T) -> String,
    M: FnOnce(&mut T),
  {
    let Some((path, _)) = self.locate(dataset, |r: &T| key_fn(r) == key)? else {
      return Ok(false);
    };

    let relocation = self.locks.with_path(&path, || -> StoreResult<Option<(T, T, PathBuf)>> {
      let Some(current) = read_record::<T>(&path)? else {
        return Ok(None);
      };
      if key_fn(&current) != key {
        return Ok(None);
      }

      let mut next = current.clone();
      mutate(&mut next);
      let next_key = key_fn(&next);
      let next_path = self.record_path(dataset, &next, &next_key)?;

      if next_path == path {
        write_atomic(&path, &self.encode(dataset, &next)?)?;
        tracing::debug!(%dataset, %key, "updated record");
      }
      Ok(Some((current, next, next_path)))
    })?;

    let Some((current, next, next_path)) = relocation else {
      return Ok(false);
    };
    if next_path == path {
      return Ok(true);
    }

    // Moving to a new path: retake both locks in a deadlock-free order and confirm
    // nobody changed the record in between.
    self.locks.with_paths(&path, &next_path, || {
      match read_record::<T>(&path)? {
        Some(latest) if latest == current => {}
        _ => {
          return Err(StoreError::Conflict {
            dataset: dataset.to_string(),
            key: key.to_string(),
          });
        }
      }
      if next_path.exists() {
        return Err(StoreError::DuplicateKey {
          dataset: dataset.to_string(),
          key: key_fn(&next),
        });
      }
      write_atomic(&next_path, &self.encode(dataset, &next)?)?;
      fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
      tracing::debug!(%dataset, %key, from = %path.display(), to = %next_path.display(), "moved record");
      Ok(true)
    })
  }

  /// Update keyed by the record id
  pub fn update_by_id<T, M>(&self, dataset: &Dataset, id: &str, mutate: M) -> StoreResult<bool>
  where
    T: Record,
    M: FnOnce(&mut T),
  {
    self.update(dataset, |r: &T| r.id().to_string(), id, mutate)
  }

  /// Delete the record whose key equals `key`. Returns false if none exists.
  pub fn delete<T, K>(&self, dataset: &Dataset, key_fn: K, key: &str) -> StoreResult<bool>
  where
    T: Record,
    K: Fn(&T) -> String,
  {
    let Some((path, _)) = self.locate(dataset, |r: &T| key_fn(r) == key)? else {
      return Ok(false);
    };

    self.locks.with_path(&path, || {
      match read_record::<T>(&path)? {
        Some(current) if key_fn(&current) == key => {}
        _ => return Ok(false),
      }
      match fs::remove_file(&path) {
        Ok(()) => {
          tracing::debug!(%dataset, %key, "deleted record");
          Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(&path, e)),
      }
    })
  }

  /// Delete keyed by the record id
  pub fn delete_by_id<T: Record>(&self, dataset: &Dataset, id: &str) -> StoreResult<bool> {
    self.delete(dataset, |r: &T| r.id().to_string(), id)
  }

  // ---------------------------------------------------------------------------
  // Internals
  // ---------------------------------------------------------------------------

  /// Find the first matching record together with the file it was read from
  fn locate<T, P>(&self, dataset: &Dataset, predicate: P) -> StoreResult<Option<(PathBuf, T)>>
  where
    T: Record,
    P: Fn(&T) -> bool,
  {
    for path in self.record_files(dataset)? {
      if let Some(record) = self.read_locked::<T>(&path)?
        && predicate(&record)
      {
        return Ok(Some((path, record)));
      }
    }
    Ok(None)
  }

  fn read_locked<T: Record>(&self, path: &Path) -> StoreResult<Option<T>> {
    self.locks.with_path(path, || read_record(path))
  }

  /// Record files of a dataset, sorted. Partitioned datasets are scanned one level deep.
  fn record_files(&self, dataset: &Dataset) -> StoreResult<Vec<PathBuf>> {
    let root = self.dataset_dir(dataset);
    let dirs = if dataset.is_partitioned() {
      list_entries(&root)?.into_iter().filter(|p| p.is_dir()).collect()
    } else {
      vec![root]
    };

    let mut files = Vec::new();
    for dir in dirs {
      files.extend(
        list_entries(&dir)?
          .into_iter()
          .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == self.extension.as_str())),
      );
    }
    files.sort();
    Ok(files)
  }

  fn encode<T: Record>(&self, dataset: &Dataset, record: &T) -> StoreResult<String> {
    serde_yaml::to_string(record).map_err(|e| StoreError::Encode {
      dataset: dataset.to_string(),
      reason: e.to_string(),
    })
  }
}

/// Entries of a directory; a missing directory is empty
fn list_entries(dir: &Path) -> StoreResult<Vec<PathBuf>> {
  let entries = match fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(StoreError::io(dir, e)),
  };

  let mut out = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|e| StoreError::io(dir, e))?;
    out.push(entry.path());
  }
  Ok(out)
}

/// Read and decode one record file; `None` if the file does not exist
fn read_record<T: Record>(path: &Path) -> StoreResult<Option<T>> {
  let text = match fs::read_to_string(path) {
    Ok(text) => text,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(StoreError::io(path, e)),
  };
  serde_yaml::from_str(&text).map(Some).map_err(|e| StoreError::Decode {
    path: path.to_path_buf(),
    reason: e.to_string(),
  })
}

/// Sibling temp file used for atomic replacement: `<path>.tmp`
pub fn tmp_path(path: &Path) -> PathBuf {
  let mut name = OsString::from(path.as_os_str());
  name.push(".tmp");
  PathBuf::from(name)
}

/// Write `contents` to `path` via `<path>.tmp` + rename. The target is either the old
/// file or the complete new one, never a partial write.
pub fn write_atomic(path: &Path, contents: &str) -> StoreResult<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
  }

  let tmp = tmp_path(path);
  let result = (|| -> io::Result<()> {
    let mut file = fs::File::create(&tmp)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp, path)
  })();

  if let Err(e) = result {
    let _ = fs::remove_file(&tmp);
    return Err(StoreError::io(path, e));
  }
  Ok(())
}

/// A key or partition must be a single, non-special path component
fn is_safe_segment(segment: &str) -> bool {
  !segment.trim().is_empty()
    && segment != "."
    && segment != ".."
    && !segment.contains(['/', '\\', '\0'])
}
