//! Per-instance aggregate: the open shard map, the instance options, and the
//! operations on one docType's full language shard set.
//!
//! Every method here assumes the instance lock is already held and that the
//! caller performed the existence checks; keeping that contract explicit
//! keeps lock scope visible at the controller level.

use crate::error::{Result, SkilletError};
use crate::index::shard::Shard;
use crate::index::snapshot;
use crate::mapping::MappingStore;
use crate::replication::QueryClient;
use crate::types::{InstanceOptions, CONTENT_DOC_TYPE, FILES_DOC_TYPE};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const OPTIONS_FILE: &str = "config.yml";

/// Mutable per-instance state, guarded by the instance lock.
pub struct InstanceState {
    /// docType -> (language -> shard). Either the full language set of a
    /// docType is present or the docType entry is absent.
    shards: HashMap<String, HashMap<String, Shard>>,
    pub(crate) options: InstanceOptions,
}

impl InstanceState {
    pub fn options(&self) -> &InstanceOptions {
        &self.options
    }

    pub fn doc_types(&self) -> Vec<String> {
        let mut doc_types: Vec<String> = self.shards.keys().cloned().collect();
        doc_types.sort();
        doc_types
    }

    pub fn shard(&self, doc_type: &str, lang: &str) -> Option<&Shard> {
        self.shards.get(doc_type).and_then(|langs| langs.get(lang))
    }

    pub fn has_doc_type(&self, doc_type: &str) -> bool {
        self.shards.contains_key(doc_type)
    }
}

pub struct InstanceIndex {
    name: String,
    dir: PathBuf,
    pub(crate) state: Mutex<InstanceState>,
}

impl InstanceIndex {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, options: InstanceOptions) -> Self {
        InstanceIndex {
            name: name.into(),
            dir: dir.into(),
            state: Mutex::new(InstanceState {
                shards: HashMap::new(),
                options,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn shard_path(&self, lang: &str, doc_type: &str) -> PathBuf {
        self.dir.join(lang).join(doc_type)
    }

    /// Read persisted options, falling back to defaults when the instance
    /// has no config file yet. A malformed file is an error.
    pub fn load_options(dir: &Path) -> Result<InstanceOptions> {
        match std::fs::read_to_string(dir.join(OPTIONS_FILE)) {
            Ok(text) => Ok(serde_yaml::from_str(&text)?),
            Err(_) => Ok(InstanceOptions::default()),
        }
    }

    pub fn write_options(&self, options: &InstanceOptions) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(".config.yml.tmp");
        std::fs::write(&tmp, serde_yaml::to_string(options)?)?;
        std::fs::rename(&tmp, self.dir.join(OPTIONS_FILE))?;
        Ok(())
    }

    pub fn set_options(&self, state: &mut InstanceState, options: InstanceOptions) -> Result<()> {
        self.write_options(&options)?;
        state.options = options;
        Ok(())
    }

    /// Open or create every language shard of a docType. Newly created
    /// shards get their cursor set to `"0"` and the current mapping version.
    /// Any per-language failure tears the whole docType (and its paired
    /// content docType) back down before propagating.
    pub fn initialize_doc_type(
        &self,
        state: &mut InstanceState,
        doc_type: &str,
        mappings: &MappingStore,
    ) -> Result<()> {
        if let Err(e) = self.initialize_single(state, doc_type, mappings) {
            tracing::error!("failed to initialize docType {}: {}", doc_type, e);
            self.remove_doc_type_local(state, doc_type)?;
            return Err(e);
        }

        if doc_type == FILES_DOC_TYPE {
            if let Err(e) = self.initialize_single(state, CONTENT_DOC_TYPE, mappings) {
                tracing::error!("failed to initialize content docType: {}", e);
                self.remove_doc_type_local(state, CONTENT_DOC_TYPE)?;
                self.remove_doc_type_local(state, FILES_DOC_TYPE)?;
                return Err(e);
            }
        }

        Ok(())
    }

    fn initialize_single(
        &self,
        state: &mut InstanceState,
        doc_type: &str,
        mappings: &MappingStore,
    ) -> Result<()> {
        let description = mappings.load(doc_type)?;
        let languages = state.options.languages.clone();
        let highlight = state.options.highlight;

        state.shards.entry(doc_type.to_string()).or_default();

        for lang in &languages {
            if state.shard(doc_type, lang).is_some() {
                continue;
            }
            let path = self.shard_path(lang, doc_type);
            let (shard, created) = Shard::open_or_create(&path, &description, lang, highlight)?;
            if created {
                // A fresh shard reads the feed from the beginning.
                shard.set_seq("0")?;
                shard.set_mapping_version(&mappings.version(doc_type)?)?;
            } else {
                tracing::debug!(
                    "found existing index {} {} {}",
                    self.name,
                    doc_type,
                    lang
                );
            }
            state
                .shards
                .get_mut(doc_type)
                .expect("docType entry inserted above")
                .insert(lang.clone(), shard);
        }

        Ok(())
    }

    /// Drop a docType from memory and disk without read-side notification.
    fn remove_doc_type_local(&self, state: &mut InstanceState, doc_type: &str) -> Result<()> {
        // Shards must be dropped before their directories are removed.
        state.shards.remove(doc_type);
        for lang in state.options.languages.clone() {
            let path = self.shard_path(&lang, doc_type);
            if path.exists() {
                std::fs::remove_dir_all(&path)?;
            }
        }
        Ok(())
    }

    pub async fn delete_doc_type(
        &self,
        state: &mut InstanceState,
        doc_type: &str,
        notify: Option<&QueryClient>,
    ) -> Result<()> {
        self.delete_single(state, doc_type, notify).await?;
        if doc_type == FILES_DOC_TYPE {
            self.delete_single(state, CONTENT_DOC_TYPE, notify).await?;
        }
        Ok(())
    }

    async fn delete_single(
        &self,
        state: &mut InstanceState,
        doc_type: &str,
        notify: Option<&QueryClient>,
    ) -> Result<()> {
        state.shards.remove(doc_type);
        for lang in state.options.languages.clone() {
            let path = self.shard_path(&lang, doc_type);
            if path.exists() {
                std::fs::remove_dir_all(&path)?;
            }
            if let Some(client) = notify {
                if let Err(e) = client.notify_delete(&self.name, doc_type, &lang).await {
                    tracing::error!("error telling query side to delete index: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub async fn delete_all(
        &self,
        state: &mut InstanceState,
        notify: Option<&QueryClient>,
    ) -> Result<()> {
        for doc_type in state.doc_types() {
            if doc_type == CONTENT_DOC_TYPE {
                // Deleted alongside its files docType.
                continue;
            }
            self.delete_doc_type(state, &doc_type, notify).await?;
        }
        Ok(())
    }

    /// Snapshot one shard's store into a temp file and return its path.
    pub fn replicate(&self, state: &InstanceState, doc_type: &str, lang: &str) -> Result<PathBuf> {
        let shard = state
            .shard(doc_type, lang)
            .ok_or_else(|| SkilletError::LanguageNotFound(lang.to_string()))?;
        snapshot::write_snapshot(shard.dir())
    }

    pub fn replicate_all(&self, state: &InstanceState) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for doc_type in state.doc_types() {
            for lang in &state.options.languages {
                match self.replicate(state, &doc_type, lang) {
                    Ok(path) => paths.push(path),
                    Err(e) => {
                        tracing::error!("error on replication: {}", e);
                        return Err(e);
                    }
                }
            }
        }
        Ok(paths)
    }

    /// Replicate one shard and ship it to the read side; the temp file is
    /// removed whether or not the POST succeeds.
    pub async fn send_index_to_query(
        &self,
        state: &InstanceState,
        doc_type: &str,
        lang: &str,
        client: &QueryClient,
    ) -> Result<()> {
        let path = self.replicate(state, doc_type, lang)?;
        let result = client.send_store(&self.name, doc_type, lang, &path).await;
        let _ = std::fs::remove_file(&path);
        result
    }

    pub fn mapping_version(
        &self,
        state: &InstanceState,
        doc_type: &str,
        lang: &str,
    ) -> Result<String> {
        let shard = state
            .shard(doc_type, lang)
            .ok_or_else(|| SkilletError::LanguageNotFound(lang.to_string()))?;
        Ok(shard.mapping_version().unwrap_or_default())
    }

    pub fn make_sure_doc_type_ready(
        &self,
        state: &mut InstanceState,
        doc_type: &str,
        mappings: &MappingStore,
    ) -> Result<()> {
        if !state.has_doc_type(doc_type) {
            return self.initialize_doc_type(state, doc_type, mappings);
        }
        // Languages may have grown since the docType was opened; missing
        // shards are created lazily here.
        if state.options.languages.iter().any(|lang| {
            state.shard(doc_type, lang).is_none()
        }) {
            return self.initialize_doc_type(state, doc_type, mappings);
        }
        Ok(())
    }

    pub fn check_doc_type(&self, state: &InstanceState, doc_type: &str) -> Result<()> {
        if !state.has_doc_type(doc_type) {
            return Err(SkilletError::DocTypeNotFound(doc_type.to_string()));
        }
        Ok(())
    }

    pub fn check_doc_type_lang(
        &self,
        state: &InstanceState,
        doc_type: &str,
        lang: &str,
    ) -> Result<()> {
        if state.shard(doc_type, lang).is_none() {
            return Err(SkilletError::LanguageNotFound(lang.to_string()));
        }
        Ok(())
    }
}
