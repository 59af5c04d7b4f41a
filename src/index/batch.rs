//! Per-shard write batching for the update pipeline.

use crate::error::Result;
use crate::index::document;
use crate::index::shard::Shard;

/// Wraps one shard and its in-flight write batch. The batch auto-flushes
/// when it reaches `limit` operations; [`BatchIndex::close`] flushes any
/// remainder. The threshold is a performance knob, not a correctness one.
pub struct BatchIndex<'a> {
    shard: &'a Shard,
    writer: tantivy::IndexWriter,
    count: usize,
    limit: usize,
}

impl<'a> BatchIndex<'a> {
    pub fn new(shard: &'a Shard, limit: usize) -> Result<Self> {
        Ok(BatchIndex {
            shard,
            writer: shard.writer()?,
            count: 0,
            limit,
        })
    }

    pub fn shard(&self) -> &'a Shard {
        self.shard
    }

    /// Upsert a document into the batch.
    pub fn index_doc(
        &mut self,
        doc_id: &str,
        doc: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.writer.delete_term(self.shard.id_term(doc_id));
        self.writer
            .add_document(document::to_tantivy(self.shard.fields(), doc_id, doc))?;
        self.bump()
    }

    pub fn delete_doc(&mut self, doc_id: &str) -> Result<()> {
        self.writer.delete_term(self.shard.id_term(doc_id));
        self.bump()
    }

    fn bump(&mut self) -> Result<()> {
        self.count += 1;
        if self.count >= self.limit {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.count > 0 {
            self.writer.commit()?;
            self.shard.reload()?;
            self.count = 0;
        }
        Ok(())
    }

    /// Commit whatever is still pending.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}
