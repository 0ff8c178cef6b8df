//! Versioned, file-backed store for pipeline definitions (C5).
//!
//! One file per pipeline (`<slug>.yaml`) under a configured root directory,
//! plus a `<id>/v<N>.yaml` history subdirectory per pipeline. Write
//! operations are serialised per pipeline id; reads are concurrent against
//! an in-memory index rebuilt from disk at startup.

mod error;
mod slug;

pub use error::StoreError;

use chrono::{DateTime, Utc};
use mimir_core::pipeline::PipelineConfig;
use mimir_core::registry::{parse_plugin_ref, Registry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Metadata describing a pipeline, independent of its step configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// A stored pipeline definition: metadata plus its ordered step config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDef {
    pub id: String,
    pub metadata: PipelineMetadata,
    pub config: PipelineConfig,
}

/// Filter options accepted by `Store::list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub tag: Option<String>,
}

impl ListFilter {
    fn matches(&self, def: &PipelineDef) -> bool {
        if let Some(name) = &self.name {
            if &def.metadata.name != name {
                return false;
            }
        }
        if let Some(enabled) = self.enabled {
            if def.metadata.enabled != enabled {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !def.metadata.tags.contains(tag) {
                return false;
            }
        }
        true
    }
}

/// One entry in a pipeline's version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Result of validating a pipeline against the current plugin registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

struct IndexEntry {
    def: PipelineDef,
    file_path: PathBuf,
}

/// The pipeline store. Cheaply cloneable; internally `Arc`-backed state is
/// shared across clones.
#[derive(Clone)]
pub struct Store {
    root: PathBuf,
    index: Arc<RwLock<HashMap<String, IndexEntry>>>,
    write_locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl Store {
    /// Open (or create) a store rooted at `root`, scanning existing
    /// definitions into the in-memory index. Files that fail to parse are
    /// moved into a `quarantine/` subdirectory and reported but do not abort
    /// startup.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        let store = Self {
            root,
            index: Arc::new(RwLock::new(HashMap::new())),
            write_locks: Arc::new(RwLock::new(HashMap::new())),
        };
        store.rebuild_index().await?;
        Ok(store)
    }

    async fn rebuild_index(&self) -> Result<(), StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        let mut loaded = HashMap::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::Io(e.to_string()))? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_definition = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml") | Some("json"));
            if !is_definition {
                continue;
            }

            match self.load_definition(&path).await {
                Ok(def) => {
                    loaded.insert(def.id.clone(), IndexEntry { def, file_path: path });
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "quarantining corrupt pipeline definition");
                    self.quarantine(&path).await;
                }
            }
        }

        info!(count = loaded.len(), root = %self.root.display(), "rebuilt pipeline store index");
        *self.index.write().await = loaded;
        Ok(())
    }

    async fn quarantine(&self, path: &Path) {
        let quarantine_dir = self.root.join("quarantine");
        if tokio::fs::create_dir_all(&quarantine_dir).await.is_err() {
            return;
        }
        if let Some(file_name) = path.file_name() {
            let dest = quarantine_dir.join(file_name);
            let _ = tokio::fs::rename(path, dest).await;
        }
    }

    async fn load_definition(&self, path: &Path) -> Result<PipelineDef, StoreError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| StoreError::Io(e.to_string()))?;
        parse_definition(&bytes, path)
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.write_locks.read().await.get(id) {
            return lock.clone();
        }
        let mut locks = self.write_locks.write().await;
        locks.entry(id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn file_path_for_slug(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{slug}.yaml"))
    }

    fn history_path(&self, id: &str, version: u64) -> PathBuf {
        self.root.join(id).join(format!("v{version}.yaml"))
    }

    async fn unique_slug(&self, name: &str) -> String {
        let base = slug::slugify(name);
        let index = self.index.read().await;
        let taken: HashSet<&str> = index
            .values()
            .map(|e| e.file_path.file_stem().and_then(|s| s.to_str()).unwrap_or_default())
            .collect();
        if !taken.contains(base.as_str()) {
            return base;
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{base}-{suffix}");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Create a new pipeline definition. Fails with `NameConflict` if a
    /// pipeline with the same name already exists.
    pub async fn create(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        tags: HashSet<String>,
        config: PipelineConfig,
        created_by: Option<String>,
    ) -> Result<PipelineDef, StoreError> {
        let name = name.into();
        {
            let index = self.index.read().await;
            if index.values().any(|e| e.def.metadata.name == name) {
                return Err(StoreError::NameConflict(name));
            }
        }

        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let def = PipelineDef {
            id: id.clone(),
            metadata: PipelineMetadata {
                name,
                description,
                tags,
                enabled: true,
                created_at: now,
                updated_at: now,
                version: 1,
                created_by,
            },
            config,
        };

        let lock = self.lock_for(&id).await;
        let _guard = lock.lock().await;

        let slug = self.unique_slug(&def.metadata.name).await;
        let file_path = self.file_path_for_slug(&slug);
        self.write_definition(&file_path, &def).await?;
        self.write_history(&def).await?;

        self.index.write().await.insert(id, IndexEntry { def: def.clone(), file_path });
        Ok(def)
    }

    pub async fn get(&self, id: &str) -> Result<PipelineDef, StoreError> {
        self.index
            .read()
            .await
            .get(id)
            .map(|e| e.def.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub async fn list(&self, filter: &ListFilter) -> Vec<PipelineDef> {
        self.index
            .read()
            .await
            .values()
            .map(|e| &e.def)
            .filter(|def| filter.matches(def))
            .cloned()
            .collect()
    }

    /// Update a pipeline's metadata fields (name, description, tags,
    /// enabled), bumping its version and appending to history.
    pub async fn update_metadata(
        &self,
        id: &str,
        description: Option<String>,
        tags: Option<HashSet<String>>,
        enabled: Option<bool>,
    ) -> Result<PipelineDef, StoreError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut def = self.get(id).await?;
        if let Some(description) = description {
            def.metadata.description = Some(description);
        }
        if let Some(tags) = tags {
            def.metadata.tags = tags;
        }
        if let Some(enabled) = enabled {
            def.metadata.enabled = enabled;
        }
        def.metadata.version += 1;
        def.metadata.updated_at = Utc::now();

        self.persist_update(id, def).await
    }

    /// Replace a pipeline's step configuration after running a structural
    /// validation. Bumps version on success.
    pub async fn update_config(&self, id: &str, config: PipelineConfig) -> Result<PipelineDef, StoreError> {
        validate_structure(&config)?;

        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut def = self.get(id).await?;
        def.config = config;
        def.metadata.version += 1;
        def.metadata.updated_at = Utc::now();

        self.persist_update(id, def).await
    }

    async fn persist_update(&self, id: &str, def: PipelineDef) -> Result<PipelineDef, StoreError> {
        let file_path = self
            .index
            .read()
            .await
            .get(id)
            .map(|e| e.file_path.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        self.write_definition(&file_path, &def).await?;
        self.write_history(&def).await?;

        self.index
            .write()
            .await
            .insert(id.to_string(), IndexEntry { def: def.clone(), file_path });
        Ok(def)
    }

    /// Delete a pipeline. Callers that track scheduled jobs must check
    /// whether `id` is referenced before calling this; the store itself has
    /// no knowledge of the scheduler and returns `Ok` unconditionally when
    /// the id exists.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let entry = self
            .index
            .write()
            .await
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let _ = tokio::fs::remove_file(&entry.file_path).await;
        let history_dir = self.root.join(id);
        let _ = tokio::fs::remove_dir_all(&history_dir).await;
        Ok(())
    }

    /// Clone an existing pipeline under a new name, as a fresh definition at
    /// version 1.
    pub async fn clone_as(&self, id: &str, new_name: impl Into<String>) -> Result<PipelineDef, StoreError> {
        let source = self.get(id).await?;
        self.create(
            new_name,
            source.metadata.description.clone(),
            source.metadata.tags.clone(),
            source.config.clone(),
            source.metadata.created_by.clone(),
        )
        .await
    }

    /// Structural validation plus resolving every step's plugin reference
    /// against a live registry.
    pub async fn validate(&self, id: &str, registry: &Registry) -> Result<ValidationReport, StoreError> {
        let def = self.get(id).await?;
        let mut errors = Vec::new();

        if let Err(e) = validate_structure(&def.config) {
            errors.push(e.to_string());
        }
        for step in &def.config.steps {
            if !registry.contains(&step.plugin) {
                errors.push(format!("step '{}' references unregistered plugin '{}'", step.name, step.plugin));
            }
        }

        Ok(ValidationReport {
            valid: errors.is_empty(),
            errors,
        })
    }

    /// Version history, most recent first. Reads whatever `v*.yaml` files
    /// exist under the pipeline's history directory rather than trusting an
    /// in-memory log, so history survives a process restart.
    pub async fn history(&self, id: &str) -> Result<Vec<VersionEntry>, StoreError> {
        if self.get(id).await.is_err() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let history_dir = self.root.join(id);
        let mut entries = match tokio::fs::read_dir(&history_dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::Io(e.to_string()))? {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let Some(version_str) = stem.strip_prefix('v') else { continue };
            let Ok(version) = version_str.parse::<u64>() else { continue };
            let metadata = tokio::fs::metadata(&path).await.map_err(|e| StoreError::Io(e.to_string()))?;
            let updated_at = metadata
                .modified()
                .ok()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(Utc::now);
            versions.push(VersionEntry { version, updated_at });
        }
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    async fn write_definition(&self, path: &Path, def: &PipelineDef) -> Result<(), StoreError> {
        let bytes = serde_yaml::to_vec(def).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp_path = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp_path, &bytes).await.map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp_path, path).await.map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    async fn write_history(&self, def: &PipelineDef) -> Result<(), StoreError> {
        let history_path = self.history_path(&def.id, def.metadata.version);
        if let Some(parent) = history_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let bytes = serde_yaml::to_vec(def).map_err(|e| StoreError::Serialization(e.to_string()))?;
        tokio::fs::write(&history_path, bytes).await.map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}

fn parse_definition(bytes: &[u8], path: &Path) -> Result<PipelineDef, StoreError> {
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    } else {
        serde_yaml::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Structural validation: every step has a name and a well-formed plugin
/// reference. Does not touch a registry (see `Store::validate` for that).
fn validate_structure(config: &PipelineConfig) -> Result<(), StoreError> {
    if config.steps.is_empty() {
        return Err(StoreError::Invalid("pipeline must declare at least one step".to_string()));
    }
    for step in &config.steps {
        if step.name.trim().is_empty() {
            return Err(StoreError::Invalid("step name must not be empty".to_string()));
        }
        if parse_plugin_ref(&step.plugin).is_err() {
            return Err(StoreError::Invalid(format!(
                "step '{}' has malformed plugin reference '{}'",
                step.name, step.plugin
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimir_core::pipeline::StepConfig;
    use tempfile::tempdir;

    fn sample_config() -> PipelineConfig {
        PipelineConfig {
            id: String::new(),
            description: None,
            steps: vec![StepConfig {
                name: "s1".to_string(),
                plugin: "Data_Processing.echo".to_string(),
                config: serde_json::Value::Null,
                output: None,
                continue_on_error: false,
            }],
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        let def = store
            .create("demo", None, HashSet::new(), sample_config(), None)
            .await
            .unwrap();
        let fetched = store.get(&def.id).await.unwrap();
        assert_eq!(fetched.metadata.name, "demo");
        assert_eq!(fetched.metadata.version, 1);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        store.create("demo", None, HashSet::new(), sample_config(), None).await.unwrap();
        let err = store
            .create("demo", None, HashSet::new(), sample_config(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NameConflict(_)));
    }

    #[tokio::test]
    async fn update_config_bumps_version_and_records_history() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        let def = store.create("demo", None, HashSet::new(), sample_config(), None).await.unwrap();

        let mut updated_config = sample_config();
        updated_config.steps[0].name = "s1-renamed".to_string();
        store.update_config(&def.id, updated_config).await.unwrap();

        let fetched = store.get(&def.id).await.unwrap();
        assert_eq!(fetched.metadata.version, 2);
        let history = store.history(&def.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 2);
    }

    #[tokio::test]
    async fn delete_removes_pipeline() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        let def = store.create("demo", None, HashSet::new(), sample_config(), None).await.unwrap();
        store.delete(&def.id).await.unwrap();
        assert!(matches!(store.get(&def.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn reopen_rebuilds_index_from_disk() {
        let dir = tempdir().unwrap();
        let id = {
            let store = Store::open(dir.path()).await.unwrap();
            let def = store.create("demo", None, HashSet::new(), sample_config(), None).await.unwrap();
            def.id
        };
        let reopened = Store::open(dir.path()).await.unwrap();
        assert!(reopened.get(&id).await.is_ok());
    }

    #[tokio::test]
    async fn corrupt_file_is_quarantined_not_fatal() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("broken.yaml"), b"not: valid: yaml: [").await.unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        assert!(store.list(&ListFilter::default()).await.is_empty());
        assert!(dir.path().join("quarantine").join("broken.yaml").exists());
    }

    #[tokio::test]
    async fn validate_reports_missing_plugin() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        let def = store.create("demo", None, HashSet::new(), sample_config(), None).await.unwrap();
        let registry = Registry::new();
        let report = store.validate(&def.id, &registry).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }
}
