//! The incremental update pipeline: one updater instance drives one pass
//! over the change feed for one (instance, docType).

use crate::changes::{Change, ChangesRequest, ChangesSource};
use crate::content::ContentFetcher;
use crate::error::{Result, SkilletError};
use crate::index::batch::BatchIndex;
use crate::index::instance::InstanceState;
use crate::language::LanguageIdentify;
use crate::types::{CONTENT_DOC_TYPE, FILES_DOC_TYPE};
use std::collections::HashMap;

pub const DEFAULT_BATCH_SIZE: usize = 300;

pub struct IndexUpdater<'a> {
    instance_name: String,
    doc_type: String,
    /// Whether extracted bodies are maintained alongside file metadata.
    content: bool,
    languages: Vec<String>,
    batches: HashMap<String, BatchIndex<'a>>,
    content_batches: HashMap<String, BatchIndex<'a>>,
}

impl<'a> IndexUpdater<'a> {
    pub fn new(
        instance_name: &str,
        state: &'a InstanceState,
        doc_type: &str,
        batch_size: usize,
    ) -> Result<Self> {
        let content = state.options().content && doc_type == FILES_DOC_TYPE;
        let languages = state.options().languages.clone();

        let mut batches = HashMap::new();
        for lang in &languages {
            let shard = state
                .shard(doc_type, lang)
                .ok_or_else(|| SkilletError::LanguageNotFound(lang.clone()))?;
            batches.insert(lang.clone(), BatchIndex::new(shard, batch_size)?);
        }

        let mut content_batches = HashMap::new();
        if content {
            for lang in &languages {
                let shard = state
                    .shard(CONTENT_DOC_TYPE, lang)
                    .ok_or_else(|| SkilletError::LanguageNotFound(lang.clone()))?;
                content_batches.insert(lang.clone(), BatchIndex::new(shard, batch_size)?);
            }
        }

        Ok(IndexUpdater {
            instance_name: instance_name.to_string(),
            doc_type: doc_type.to_string(),
            content,
            languages,
            batches,
            content_batches,
        })
    }

    /// Run one pass: read the feed from the persisted cursor, route every
    /// change, flush all batches, then advance the cursor on every language
    /// shard of the docType.
    pub async fn update(
        mut self,
        feed: &dyn ChangesSource,
        extractor: &dyn ContentFetcher,
        lang_id: &dyn LanguageIdentify,
    ) -> Result<()> {
        let first_lang = self
            .languages
            .first()
            .cloned()
            .ok_or_else(|| SkilletError::Config("no language configured".to_string()))?;
        // All language shards of a docType advance together, so any one of
        // them holds the cursor.
        let since = self.batches[&first_lang].shard().seq();

        let request = ChangesRequest {
            doc_type: self.doc_type.clone(),
            since,
            include_docs: true,
        };
        let response = feed.changes(&self.instance_name, &request).await?;

        for change in &response.results {
            match change.doc.get("type").and_then(|v| v.as_str()) {
                // Directory records carry no body and are not a searchable
                // entity; untyped records are ignored the same way.
                None | Some("directory") => continue,
                Some(_) => {}
            }

            let original_lang = self.find_which_lang(&change.id)?;

            if is_deleted(change) {
                if let Some(lang) = original_lang {
                    self.delete_doc(&lang, &change.id)?;
                }
                // Never indexed, or already gone.
                continue;
            }

            match original_lang {
                Some(lang) => self.update_doc(&lang, change, extractor).await?,
                None => self.create_doc(change, extractor, lang_id).await?,
            }
        }

        // The cursor may only move once every batch of the run is committed.
        let mut shards = Vec::with_capacity(self.languages.len());
        for lang in &self.languages {
            let batch = self
                .batches
                .remove(lang)
                .ok_or_else(|| SkilletError::LanguageNotFound(lang.clone()))?;
            shards.push(batch.shard());
            batch.close()?;
        }
        for (_, batch) in self.content_batches.drain() {
            batch.close()?;
        }
        for shard in shards {
            shard.set_seq(&response.last_seq)?;
        }

        Ok(())
    }

    /// A document lives in at most one language shard of its docType; scan
    /// the set for the one already holding this id.
    fn find_which_lang(&self, doc_id: &str) -> Result<Option<String>> {
        for lang in &self.languages {
            if self.batches[lang].shard().contains(doc_id)? {
                return Ok(Some(lang.clone()));
            }
        }
        Ok(None)
    }

    fn delete_doc(&mut self, lang: &str, doc_id: &str) -> Result<()> {
        self.batch_mut(lang)?.delete_doc(doc_id)?;
        if self.content {
            self.content_batch_mut(lang)?.delete_doc(doc_id)?;
        }
        Ok(())
    }

    /// Update path: the document stays in its original shard and is never
    /// re-classified, even when its text now reads as another language.
    async fn update_doc(
        &mut self,
        lang: &str,
        change: &Change,
        extractor: &dyn ContentFetcher,
    ) -> Result<()> {
        let mut doc = change.doc.clone();
        doc.insert(
            "docType".to_string(),
            serde_json::Value::String(self.doc_type.clone()),
        );

        if self.content {
            let stored = self.batches[lang].shard().md5sum(&change.id).unwrap_or_default();
            let incoming = doc
                .get("md5sum")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if stored != incoming {
                let body = extractor.fetch(&self.instance_name, &change.id).await?;
                self.content_batch_mut(lang)?
                    .index_doc(&change.id, &content_document(body))?;
                self.batches[lang].shard().set_md5sum(&change.id, &incoming)?;
            }
        }

        self.batch_mut(lang)?.index_doc(&change.id, &doc)
    }

    /// Create path: route the document to the shard of its predicted
    /// language.
    async fn create_doc(
        &mut self,
        change: &Change,
        extractor: &dyn ContentFetcher,
        lang_id: &dyn LanguageIdentify,
    ) -> Result<()> {
        let mut doc = change.doc.clone();

        let pred = if self.content {
            let body = extractor.fetch(&self.instance_name, &change.id).await?;
            let pred = self.route(lang_id.guess(&body, &self.languages));

            self.content_batch_mut(&pred)?
                .index_doc(&change.id, &content_document(body))?;

            let incoming = doc
                .get("md5sum")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            self.batches[&pred].shard().set_md5sum(&change.id, &incoming)?;
            pred
        } else {
            let name = doc.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            self.route(lang_id.guess(name, &self.languages))
        };

        doc.insert(
            "docType".to_string(),
            serde_json::Value::String(self.doc_type.clone()),
        );
        self.batch_mut(&pred)?.index_doc(&change.id, &doc)
    }

    /// The identifier may fall back to a default outside the instance's
    /// configured set; such documents land in the first configured language.
    fn route(&self, pred: String) -> String {
        if self.batches.contains_key(&pred) {
            pred
        } else {
            tracing::warn!(
                "predicted language '{}' has no shard, routing to '{}'",
                pred,
                self.languages[0]
            );
            self.languages[0].clone()
        }
    }

    fn batch_mut(&mut self, lang: &str) -> Result<&mut BatchIndex<'a>> {
        self.batches
            .get_mut(lang)
            .ok_or_else(|| SkilletError::LanguageNotFound(lang.to_string()))
    }

    fn content_batch_mut(&mut self, lang: &str) -> Result<&mut BatchIndex<'a>> {
        self.content_batches
            .get_mut(lang)
            .ok_or_else(|| SkilletError::LanguageNotFound(lang.to_string()))
    }
}

fn is_deleted(change: &Change) -> bool {
    change.deleted
        || change.doc.get("_deleted").and_then(|v| v.as_bool()) == Some(true)
        || change.doc.get("trashed").and_then(|v| v.as_bool()) == Some(true)
}

fn content_document(body: String) -> serde_json::Map<String, serde_json::Value> {
    let mut doc = serde_json::Map::new();
    doc.insert("content".to_string(), serde_json::Value::String(body));
    doc.insert(
        "docType".to_string(),
        serde_json::Value::String(CONTENT_DOC_TYPE.to_string()),
    );
    doc
}
