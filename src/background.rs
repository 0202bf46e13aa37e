use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::categorizer::{auto_categorize, CategorizeSummary};
use crate::classifier::Classifier;
use crate::db::get_connection;
use crate::error::{Result, SchedcError};

/// A detached auto-categorization run. Failures go to the log only.
pub struct BackgroundJob {
    worker: JoinHandle<Option<CategorizeSummary>>,
    sink: JoinHandle<()>,
}

/// Start auto-categorization on a blocking worker with its own connection,
/// so the upload that triggered it returns immediately.
pub fn spawn_auto_categorize(
    handle: &Handle,
    db_path: PathBuf,
    classifier: Option<Arc<dyn Classifier>>,
) -> BackgroundJob {
    let (errors, mut rx) = mpsc::unbounded_channel::<SchedcError>();

    let sink = handle.spawn(async move {
        while let Some(e) = rx.recv().await {
            tracing::error!(error = %e, "background auto-categorization failed");
        }
    });

    let worker = handle.spawn_blocking(move || {
        let run = || -> Result<CategorizeSummary> {
            let conn = get_connection(&db_path)?;
            auto_categorize(&conn, classifier.as_deref())
        };
        match run() {
            Ok(summary) => Some(summary),
            Err(e) => {
                let _ = errors.send(e);
                None
            }
        }
    });

    BackgroundJob { worker, sink }
}

impl BackgroundJob {
    /// Block until the run and its log sink finish. Must not be called from
    /// inside the runtime.
    pub fn wait(self, handle: &Handle) -> Option<CategorizeSummary> {
        handle.block_on(async move {
            let summary = match self.worker.await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::error!(error = %e, "auto-categorization task aborted");
                    None
                }
            };
            let _ = self.sink.await;
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::{CanonicalTransaction, Classification, ClassifyRequest, TransactionType};
    use crate::store::Store;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct Meals;

    impl Classifier for Meals {
        fn classify_batch(&self, items: &[ClassifyRequest]) -> Result<HashMap<String, Classification>> {
            Ok(items.iter().map(|i| (i.id.clone(), self.classify_one(i).unwrap())).collect())
        }

        fn classify_one(&self, _item: &ClassifyRequest) -> Result<Classification> {
            Ok(Classification {
                category: "Meals".into(),
                schedule_c_line: 24,
                expensable: true,
                purpose: "client lunch".into(),
                confidence: 0.7,
            })
        }
    }

    #[test]
    fn test_background_run_classifies() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let conn = get_connection(&db_path).unwrap();
        init_db(&conn).unwrap();
        let mut tx = CanonicalTransaction::shell("f", "Chase", TransactionType::Expense);
        tx.date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        tx.vendor = "DINER".into();
        tx.amount = 30.0;
        tx.is_business = true;
        conn.insert_transaction(&tx).unwrap();

        let rt = tokio::runtime::Runtime::new().unwrap();
        let job = spawn_auto_categorize(rt.handle(), db_path, Some(Arc::new(Meals)));
        let summary = job.wait(rt.handle()).unwrap();
        assert_eq!(summary.classified, 1);
        assert_eq!(conn.get_transaction(&tx.id).unwrap().unwrap().category, "Meals");
    }

    #[test]
    fn test_background_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("missing").join("nested").join("test.db");
        let rt = tokio::runtime::Runtime::new().unwrap();
        let job = spawn_auto_categorize(rt.handle(), db_path, None);
        assert!(job.wait(rt.handle()).is_none());
    }
}
