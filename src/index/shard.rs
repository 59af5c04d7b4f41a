//! A shard is one on-disk inverted index for a (instance, docType, language)
//! triple, plus its internal key store (cursor, mapping version, content
//! fingerprints).

use crate::error::Result;
use crate::index::document::{self, ShardFields};
use crate::index::internal::InternalStore;
use crate::language::stemmer_for_label;
use crate::mapping::MappingDescription;
use std::path::{Path, PathBuf};
use tantivy::collector::Count;
use tantivy::query::TermQuery;
use tantivy::schema::IndexRecordOption;
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, Stemmer, TextAnalyzer};
use tantivy::{Index as TantivyIndex, IndexReader, ReloadPolicy, Term};

const SEQ_KEY: &str = "seq";
const MAPPING_VERSION_KEY: &str = "mappingVersion";
const MD5_KEY_PREFIX: &str = "md5sum:";

/// Writer heap per shard; tantivy splits it across its indexing threads.
const WRITER_BUFFER_SIZE: usize = 20_000_000;

pub struct Shard {
    index: TantivyIndex,
    reader: IndexReader,
    fields: ShardFields,
    internal: InternalStore,
    dir: PathBuf,
}

impl Shard {
    /// Open the shard at `dir`, creating it with the mapping's schema when
    /// the directory holds no index yet. Returns whether it was created.
    pub fn open_or_create(
        dir: &Path,
        description: &MappingDescription,
        lang: &str,
        highlight: bool,
    ) -> Result<(Self, bool)> {
        let exists = dir.join("meta.json").exists();

        let index = if exists {
            TantivyIndex::open_in_dir(dir)?
        } else {
            tracing::info!("creating new index {}", dir.display());
            std::fs::create_dir_all(dir)?;
            let schema = document::build_schema(description, lang, highlight);
            TantivyIndex::create_in_dir(dir, schema)?
        };

        register_analyzer(&index, lang);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let fields = document::resolve_fields(&index.schema(), description)?;
        let internal = InternalStore::open(dir)?;

        Ok((
            Shard {
                index,
                reader,
                fields,
                internal,
                dir: dir.to_path_buf(),
            },
            !exists,
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn fields(&self) -> &ShardFields {
        &self.fields
    }

    pub fn writer(&self) -> Result<tantivy::IndexWriter> {
        Ok(self.index.writer(WRITER_BUFFER_SIZE)?)
    }

    /// Make the latest commit visible to [`Shard::contains`] and counts.
    pub fn reload(&self) -> Result<()> {
        self.reader.reload()?;
        Ok(())
    }

    pub fn id_term(&self, doc_id: &str) -> Term {
        Term::from_field_text(self.fields.id, doc_id)
    }

    /// Whether a document id is present in this shard's committed state.
    pub fn contains(&self, doc_id: &str) -> Result<bool> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(self.id_term(doc_id), IndexRecordOption::Basic);
        let count = searcher.search(&query, &Count)?;
        Ok(count > 0)
    }

    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn seq(&self) -> String {
        self.internal.get(SEQ_KEY).unwrap_or_default()
    }

    pub fn set_seq(&self, seq: &str) -> Result<()> {
        self.internal.set(SEQ_KEY, seq)
    }

    pub fn mapping_version(&self) -> Option<String> {
        self.internal.get(MAPPING_VERSION_KEY)
    }

    pub fn set_mapping_version(&self, version: &str) -> Result<()> {
        self.internal.set(MAPPING_VERSION_KEY, version)
    }

    pub fn md5sum(&self, doc_id: &str) -> Option<String> {
        self.internal.get(&format!("{}{}", MD5_KEY_PREFIX, doc_id))
    }

    pub fn set_md5sum(&self, doc_id: &str, md5sum: &str) -> Result<()> {
        self.internal
            .set(&format!("{}{}", MD5_KEY_PREFIX, doc_id), md5sum)
    }
}

fn register_analyzer(index: &TantivyIndex, lang: &str) {
    let analyzer = match stemmer_for_label(lang) {
        Some(stemmer_lang) => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(Stemmer::new(stemmer_lang))
            .build(),
        None => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .build(),
    };
    index
        .tokenizers()
        .register(&document::analyzer_name(lang), analyzer);
}
