use rocksdb::{Options, WriteBatch, DB};
use std::path::Path;
use tracing::warn;

use crate::error::StoreError;
use crate::models::{LatestAnswer, LatestAnswers};

/// Durable home for the latest answer snapshot, so a restart can serve the
/// previous cycle's answers before the first new cycle completes.
pub trait AnswerStore: Send + Sync {
    fn save(&self, answers: &LatestAnswers) -> Result<(), StoreError>;
    fn load(&self) -> Result<LatestAnswers, StoreError>;
}

/// One key per symbol, JSON-encoded `LatestAnswer` as the value.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let db = DB::open(&opts, path)?;
        Ok(RocksStore { db })
    }
}

impl AnswerStore for RocksStore {
    /// Writes the whole snapshot in one batch.
    fn save(&self, answers: &LatestAnswers) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        for (symbol, answer) in answers {
            match answer {
                Some(answer) => batch.put(symbol.as_bytes(), serde_json::to_vec(answer)?),
                None => batch.delete(symbol.as_bytes()),
            }
        }
        self.db.write(batch)?;
        Ok(())
    }

    fn load(&self) -> Result<LatestAnswers, StoreError> {
        let mut answers = LatestAnswers::new();
        for item in self.db.iterator(rocksdb::IteratorMode::Start) {
            let (key, value) = item?;
            let symbol = String::from_utf8_lossy(&key).into_owned();
            match serde_json::from_slice::<LatestAnswer>(&value) {
                Ok(answer) => {
                    answers.insert(symbol, Some(answer));
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "skipping unreadable stored answer"),
            }
        }
        Ok(answers)
    }
}
