//! The public surface of the core: discovers instances, multiplexes calls to
//! the right [`InstanceIndex`], and acquires the instance lock before
//! delegating.

use crate::changes::ChangesSource;
use crate::content::ContentFetcher;
use crate::error::{Result, SkilletError};
use crate::index::instance::InstanceIndex;
use crate::index::updater::{IndexUpdater, DEFAULT_BATCH_SIZE};
use crate::index::worker::{self, UpdateQueue, WorkerConfig};
use crate::language::LanguageIdentify;
use crate::mapping::MappingStore;
use crate::replication::QueryClient;
use crate::types::{InstanceOptions, OptionsPatch, UpdateNotif};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ControllerConfig {
    /// Root of the write-side shard tree, one directory per instance.
    pub root: PathBuf,
    /// Directory of docType description files.
    pub mapping_dir: PathBuf,
    /// Base URL of the read-side query service.
    pub query_url: String,
    pub batch_size: usize,
    pub worker: WorkerConfig,
}

impl ControllerConfig {
    pub fn new(
        root: impl Into<PathBuf>,
        mapping_dir: impl Into<PathBuf>,
        query_url: impl Into<String>,
    ) -> Self {
        ControllerConfig {
            root: root.into(),
            mapping_dir: mapping_dir.into(),
            query_url: query_url.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            worker: WorkerConfig::default(),
        }
    }
}

pub struct IndexController {
    root: PathBuf,
    mappings: MappingStore,
    batch_size: usize,
    instances: DashMap<String, Arc<InstanceIndex>>,
    /// Serializes lazy instance creation; never held across shard I/O of an
    /// already-known instance.
    create_lock: tokio::sync::Mutex<()>,
    feed: Arc<dyn ChangesSource>,
    extractor: Arc<dyn ContentFetcher>,
    lang_id: Arc<dyn LanguageIdentify>,
    query: QueryClient,
    queue: UpdateQueue,
}

impl IndexController {
    /// Build the controller together with its work queue and consumer.
    /// Must be called within a tokio runtime.
    pub fn new(
        config: ControllerConfig,
        feed: Arc<dyn ChangesSource>,
        extractor: Arc<dyn ContentFetcher>,
        lang_id: Arc<dyn LanguageIdentify>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let queue = worker::start(weak.clone(), config.worker.clone());
            IndexController {
                root: config.root,
                mappings: MappingStore::new(config.mapping_dir),
                batch_size: config.batch_size,
                instances: DashMap::new(),
                create_lock: tokio::sync::Mutex::new(()),
                feed,
                extractor,
                lang_id,
                query: QueryClient::new(config.query_url),
                queue,
            }
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mappings(&self) -> &MappingStore {
        &self.mappings
    }

    pub fn doc_types(&self) -> Result<Vec<String>> {
        self.mappings.doc_types()
    }

    pub fn instance_names(&self) -> Vec<String> {
        self.instances.iter().map(|e| e.key().clone()).collect()
    }

    /// Initialize every listed instance with all known docTypes. Any
    /// failure is fatal to init.
    pub async fn init(&self, instances: &[String]) -> Result<()> {
        for name in instances {
            self.initialize_instance(name).await?;
        }
        Ok(())
    }

    async fn initialize_instance(&self, name: &str) -> Result<Arc<InstanceIndex>> {
        let _creating = self.create_lock.lock().await;
        if let Some(existing) = self.instances.get(name) {
            return Ok(existing.clone());
        }

        let dir = self.root.join(name);
        let options = InstanceIndex::load_options(&dir)?;
        let instance = Arc::new(InstanceIndex::new(name, dir, options));

        let doc_types = self.mappings.doc_types()?;
        {
            let mut state = instance.state.lock().await;
            let options = state.options().clone();
            instance.write_options(&options)?;
            for doc_type in &doc_types {
                instance.initialize_doc_type(&mut state, doc_type, &self.mappings)?;
            }
        }

        self.instances.insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    fn get_instance(&self, name: &str) -> Result<Arc<InstanceIndex>> {
        self.instances
            .get(name)
            .map(|entry| entry.clone())
            .ok_or_else(|| SkilletError::InstanceNotFound(name.to_string()))
    }

    /// Look the instance up; with `force`, initialize it lazily instead of
    /// failing when unknown.
    async fn instance(&self, name: &str, force: bool) -> Result<Arc<InstanceIndex>> {
        match self.get_instance(name) {
            Ok(instance) => Ok(instance),
            Err(_) if force => self.initialize_instance(name).await,
            Err(e) => Err(e),
        }
    }

    /// Enqueue one update notification per (instance, docType). Queue-full
    /// rejections are logged, not fatal.
    pub fn update_all_indexes(&self) -> Result<()> {
        let doc_types = self.mappings.doc_types()?;
        for entry in self.instances.iter() {
            for doc_type in &doc_types {
                if let Err(e) = self.add_update_notif(UpdateNotif::new(entry.key(), doc_type)) {
                    tracing::warn!(
                        "could not add update job for {}/{}: {}",
                        entry.key(),
                        doc_type,
                        e
                    );
                }
            }
        }
        Ok(())
    }

    pub fn add_update_notif(&self, notif: UpdateNotif) -> Result<()> {
        self.queue.push(notif)
    }

    /// Run one incremental update pass under the instance lock, creating
    /// the instance and docType lazily when missing.
    pub async fn update_index(&self, name: &str, doc_type: &str) -> Result<()> {
        let instance = self.instance(name, true).await?;
        let mut state = instance.state.lock().await;

        instance.make_sure_doc_type_ready(&mut state, doc_type, &self.mappings)?;
        if state.options().languages.is_empty() {
            return Err(SkilletError::Config(
                "no language found for this instance".to_string(),
            ));
        }

        let updater = IndexUpdater::new(instance.name(), &state, doc_type, self.batch_size)?;
        updater
            .update(
                self.feed.as_ref(),
                self.extractor.as_ref(),
                self.lang_id.as_ref(),
            )
            .await
    }

    pub async fn re_index(&self, name: &str, doc_type: &str) -> Result<()> {
        let instance = self.instance(name, true).await?;
        let mut state = instance.state.lock().await;
        self.re_index_locked(&instance, &mut state, doc_type).await
    }

    /// Re-index every known docType of the instance under a single lock.
    pub async fn re_index_all(&self, name: &str) -> Result<()> {
        let doc_types = self.mappings.doc_types()?;
        let instance = self.instance(name, true).await?;
        let mut state = instance.state.lock().await;
        for doc_type in &doc_types {
            self.re_index_locked(&instance, &mut state, doc_type).await?;
        }
        Ok(())
    }

    async fn re_index_locked(
        &self,
        instance: &InstanceIndex,
        state: &mut crate::index::instance::InstanceState,
        doc_type: &str,
    ) -> Result<()> {
        if state.has_doc_type(doc_type) {
            instance.delete_doc_type(state, doc_type, None).await?;
        }
        instance.initialize_doc_type(state, doc_type, &self.mappings)?;
        self.add_update_notif(UpdateNotif::new(instance.name(), doc_type))
    }

    pub async fn delete_index(&self, name: &str, doc_type: &str, notify_query: bool) -> Result<()> {
        let instance = self.get_instance(name)?;
        let mut state = instance.state.lock().await;
        instance.check_doc_type(&state, doc_type)?;
        let client = notify_query.then_some(&self.query);
        instance.delete_doc_type(&mut state, doc_type, client).await
    }

    /// Delete every docType, remove the instance root, and drop the
    /// instance. The map entry goes away after the lock is released.
    pub async fn delete_all_indexes_instance(&self, name: &str, notify_query: bool) -> Result<()> {
        let instance = self.get_instance(name)?;
        {
            let mut state = instance.state.lock().await;
            let client = notify_query.then_some(&self.query);
            instance.delete_all(&mut state, client).await?;
        }
        self.instances.remove(name);

        let dir = self.root.join(name);
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Snapshot one shard's store to a temp file and return its path.
    pub async fn replicate(&self, name: &str, doc_type: &str, lang: &str) -> Result<PathBuf> {
        let instance = self.get_instance(name)?;
        let state = instance.state.lock().await;
        instance.check_doc_type(&state, doc_type)?;
        instance.check_doc_type_lang(&state, doc_type, lang)?;
        instance.replicate(&state, doc_type, lang)
    }

    pub async fn replicate_all(&self, name: &str) -> Result<Vec<PathBuf>> {
        let instance = self.get_instance(name)?;
        let state = instance.state.lock().await;
        instance.replicate_all(&state)
    }

    /// Replicate every language shard of a docType and POST it to the read
    /// side.
    pub async fn send_index_to_query(&self, name: &str, doc_type: &str) -> Result<()> {
        let instance = self.get_instance(name)?;
        let state = instance.state.lock().await;
        instance.check_doc_type(&state, doc_type)?;
        for lang in state.options().languages.clone() {
            instance
                .send_index_to_query(&state, doc_type, &lang, &self.query)
                .await?;
        }
        Ok(())
    }

    /// Options as persisted on disk; unknown instances report defaults.
    pub fn get_options(&self, name: &str) -> Result<InstanceOptions> {
        InstanceIndex::load_options(&self.root.join(name))
    }

    /// Patch the instance options; unspecified fields keep their previous
    /// value and an empty language list is rejected.
    pub async fn set_options(&self, name: &str, patch: OptionsPatch) -> Result<InstanceOptions> {
        let instance = self.instance(name, true).await?;
        let mut state = instance.state.lock().await;

        let mut options = state.options().clone();
        if let Some(highlight) = patch.highlight {
            options.highlight = highlight;
        }
        if let Some(content) = patch.content {
            options.content = content;
        }
        if let Some(languages) = patch.languages {
            if languages.is_empty() {
                return Err(SkilletError::Config("languages can't be empty".to_string()));
            }
            options.languages = languages;
        }

        instance.set_options(&mut state, options.clone())?;
        Ok(options)
    }

    /// The schema version a shard was created with.
    pub async fn get_mapping_version(
        &self,
        name: &str,
        doc_type: &str,
        lang: &str,
    ) -> Result<String> {
        let instance = self.get_instance(name)?;
        let state = instance.state.lock().await;
        instance.check_doc_type(&state, doc_type)?;
        instance.check_doc_type_lang(&state, doc_type, lang)?;
        instance.mapping_version(&state, doc_type, lang)
    }
}
