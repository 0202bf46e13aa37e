use crate::classifier::Classifier;
use crate::error::{Result, SchedcError};
use crate::models::{
    CanonicalTransaction, Classification, ClassifiedBy, ClassifyRequest, ManualClassification,
};
use crate::store::Store;

pub const BATCH_SIZE: usize = 10;

pub struct RuleApplication {
    pub vendor: String,
    pub updated: usize,
}

/// Apply every vendor rule to the rows it matches that nobody has classified yet.
pub fn apply_vendor_rules(store: &dyn Store) -> Result<Vec<RuleApplication>> {
    let mut applied = Vec::new();
    for rule in store.vendor_rules()? {
        let updated = store.apply_vendor_rule(&rule)?;
        if updated > 0 {
            tracing::debug!(vendor = %rule.vendor, updated, "vendor rule applied");
        }
        applied.push(RuleApplication {
            vendor: rule.vendor,
            updated,
        });
    }
    Ok(applied)
}

/// A user edit. Applied as given and never overwritten by the automatic paths.
pub fn classify_manually(
    store: &dyn Store,
    id: &str,
    edit: &ManualClassification,
) -> Result<CanonicalTransaction> {
    if !store.apply_manual_classification(id, edit)? {
        return Err(SchedcError::UnknownTransaction(id.to_string()));
    }
    store
        .get_transaction(id)?
        .ok_or_else(|| SchedcError::UnknownTransaction(id.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizeSummary {
    pub rules_applied: usize,
    pub candidates: usize,
    pub classified: usize,
    /// Left out of an otherwise successful batch answer.
    pub missing: usize,
    /// Still unclassified after the per-item retry.
    pub failed: usize,
}

/// The automatic job: vendor rules first, then the classifier over whatever
/// business rows are still unclassified.
pub fn auto_categorize(
    store: &dyn Store,
    classifier: Option<&dyn Classifier>,
) -> Result<CategorizeSummary> {
    let mut summary = CategorizeSummary {
        rules_applied: apply_vendor_rules(store)?.iter().map(|r| r.updated).sum(),
        ..Default::default()
    };

    let candidates = store.classification_candidates()?;
    summary.candidates = candidates.len();

    let Some(classifier) = classifier else {
        if !candidates.is_empty() {
            tracing::info!(
                candidates = candidates.len(),
                "no classifier configured, leaving transactions uncategorized"
            );
        }
        return Ok(summary);
    };

    for (n, chunk) in candidates.chunks(BATCH_SIZE).enumerate() {
        let requests: Vec<ClassifyRequest> = chunk.iter().map(ClassifyRequest::from).collect();
        match classifier.classify_batch(&requests) {
            Ok(results) => {
                for request in &requests {
                    match results.get(&request.id) {
                        Some(c) => record(store, &request.id, c.clone(), &mut summary),
                        None => {
                            tracing::warn!(id = %request.id, vendor = %request.vendor, "no classification returned");
                            summary.missing += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(batch = n + 1, error = %e, "batch classification failed, retrying one at a time");
                for request in &requests {
                    match classifier.classify_one(request) {
                        Ok(c) => record(store, &request.id, c, &mut summary),
                        Err(e) => {
                            tracing::warn!(id = %request.id, vendor = %request.vendor, error = %e, "classification failed");
                            summary.failed += 1;
                        }
                    }
                }
            }
        }
    }

    tracing::info!(
        rules_applied = summary.rules_applied,
        candidates = summary.candidates,
        classified = summary.classified,
        missing = summary.missing,
        failed = summary.failed,
        "auto-categorization finished"
    );
    Ok(summary)
}

fn record(store: &dyn Store, id: &str, c: Classification, summary: &mut CategorizeSummary) {
    let c = c.validated();
    match store.update_classification(id, &c, ClassifiedBy::Classifier) {
        Ok(true) => {
            tracing::debug!(id, category = %c.category, line = c.schedule_c_line, confidence = c.confidence, "classified");
            summary.classified += 1;
        }
        // Classified by hand while the request was in flight.
        Ok(false) => tracing::debug!(id, "skipping manually classified transaction"),
        Err(e) => {
            tracing::error!(id, error = %e, "failed to store classification");
            summary.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::models::{TransactionType, VendorRule};
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn add_business_txn(conn: &Connection, vendor: &str, day: u32) -> String {
        let mut tx = CanonicalTransaction::shell("f1", "Chase", TransactionType::Expense);
        tx.date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        tx.vendor = vendor.to_string();
        tx.amount = 25.0;
        tx.expensable = true;
        tx.is_business = true;
        conn.insert_transaction(&tx).unwrap();
        tx.id
    }

    /// Answers "Supplies" on `line` for everything not in `omit`.
    #[derive(Default)]
    struct FakeClassifier {
        line: i32,
        batch_down: bool,
        omit: HashSet<String>,
        single_down: HashSet<String>,
        batch_sizes: Mutex<Vec<usize>>,
        singles: Mutex<usize>,
    }

    impl FakeClassifier {
        fn answering(line: i32) -> Self {
            Self { line, ..Default::default() }
        }

        fn answer(&self) -> Classification {
            Classification {
                category: "Supplies".to_string(),
                schedule_c_line: self.line,
                expensable: true,
                purpose: "materials".to_string(),
                confidence: 0.8,
            }
        }
    }

    impl Classifier for FakeClassifier {
        fn classify_batch(&self, items: &[ClassifyRequest]) -> Result<HashMap<String, Classification>> {
            self.batch_sizes.lock().unwrap().push(items.len());
            if self.batch_down {
                return Err(SchedcError::ClassifierUnavailable("timeout".into()));
            }
            Ok(items
                .iter()
                .filter(|i| !self.omit.contains(&i.id))
                .map(|i| (i.id.clone(), self.answer()))
                .collect())
        }

        fn classify_one(&self, item: &ClassifyRequest) -> Result<Classification> {
            *self.singles.lock().unwrap() += 1;
            if self.single_down.contains(&item.id) {
                return Err(SchedcError::ClassifierMalformedResponse("not json".into()));
            }
            Ok(self.answer())
        }
    }

    #[test]
    fn test_batches_of_ten() {
        let (_dir, conn) = test_db();
        for day in 1..=23 {
            add_business_txn(&conn, &format!("VENDOR {day}"), day);
        }
        let classifier = FakeClassifier::answering(22);
        let summary = auto_categorize(&conn, Some(&classifier)).unwrap();
        assert_eq!(*classifier.batch_sizes.lock().unwrap(), vec![10, 10, 3]);
        assert_eq!(summary.candidates, 23);
        assert_eq!(summary.classified, 23);
        assert_eq!(conn.transaction_counts().unwrap().uncategorized, 0);
    }

    #[test]
    fn test_missing_entry_stays_uncategorized() {
        let (_dir, conn) = test_db();
        let ids: Vec<String> = (1..=10).map(|d| add_business_txn(&conn, "SHOP", d)).collect();
        let classifier = FakeClassifier {
            line: 22,
            omit: HashSet::from([ids[4].clone()]),
            ..Default::default()
        };
        let summary = auto_categorize(&conn, Some(&classifier)).unwrap();
        assert_eq!(summary.classified, 9);
        assert_eq!(summary.missing, 1);
        assert_eq!(*classifier.singles.lock().unwrap(), 0);
        assert_eq!(conn.get_transaction(&ids[4]).unwrap().unwrap().category, "uncategorized");
        assert_eq!(conn.get_transaction(&ids[0]).unwrap().unwrap().category, "Supplies");
    }

    #[test]
    fn test_out_of_range_line_becomes_other_expenses() {
        let (_dir, conn) = test_db();
        let id = add_business_txn(&conn, "MYSTERY", 1);
        auto_categorize(&conn, Some(&FakeClassifier::answering(99))).unwrap();
        let tx = conn.get_transaction(&id).unwrap().unwrap();
        assert_eq!(tx.schedule_c_line, 27);
        assert_eq!(tx.category, "Other business expenses");
        assert_eq!(tx.classified_by, Some(ClassifiedBy::Classifier));
    }

    #[test]
    fn test_batch_failure_falls_back_to_single() {
        let (_dir, conn) = test_db();
        let ids: Vec<String> = (1..=3).map(|d| add_business_txn(&conn, "SHOP", d)).collect();
        let classifier = FakeClassifier {
            line: 18,
            batch_down: true,
            single_down: HashSet::from([ids[1].clone()]),
            ..Default::default()
        };
        let summary = auto_categorize(&conn, Some(&classifier)).unwrap();
        assert_eq!(*classifier.singles.lock().unwrap(), 3);
        assert_eq!(summary.classified, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(conn.get_transaction(&ids[1]).unwrap().unwrap().category, "uncategorized");
    }

    #[test]
    fn test_manual_rows_are_never_sent() {
        let (_dir, conn) = test_db();
        let manual = add_business_txn(&conn, "UBER", 1);
        add_business_txn(&conn, "LYFT", 2);
        classify_manually(
            &conn,
            &manual,
            &ManualClassification {
                category: Some("Travel expenses".into()),
                schedule_c_line: Some(24),
                ..Default::default()
            },
        )
        .unwrap();

        let classifier = FakeClassifier::answering(22);
        let summary = auto_categorize(&conn, Some(&classifier)).unwrap();
        assert_eq!(summary.candidates, 1);
        let tx = conn.get_transaction(&manual).unwrap().unwrap();
        assert_eq!(tx.category, "Travel expenses");
        assert_eq!(tx.schedule_c_line, 24);
    }

    #[test]
    fn test_rules_run_before_classifier() {
        let (_dir, conn) = test_db();
        let adobe = add_business_txn(&conn, "ADOBE CREATIVE", 1);
        conn.upsert_vendor_rule(&VendorRule {
            id: None,
            vendor: "adobe".into(),
            transaction_type: TransactionType::Expense,
            expensable: true,
            category: "Office expenses".into(),
            schedule_c_line: 18,
        })
        .unwrap();

        let classifier = FakeClassifier::answering(22);
        let summary = auto_categorize(&conn, Some(&classifier)).unwrap();
        assert_eq!(summary.rules_applied, 1);
        assert_eq!(summary.candidates, 0);
        assert!(classifier.batch_sizes.lock().unwrap().is_empty());
        let tx = conn.get_transaction(&adobe).unwrap().unwrap();
        assert_eq!(tx.category, "Office expenses");
        assert_eq!(tx.classified_by, Some(ClassifiedBy::Rule));
    }

    #[test]
    fn test_without_classifier_only_rules_run() {
        let (_dir, conn) = test_db();
        add_business_txn(&conn, "SHOP", 1);
        let summary = auto_categorize(&conn, None).unwrap();
        assert_eq!(summary.candidates, 1);
        assert_eq!(summary.classified, 0);
    }

    #[test]
    fn test_classify_manually_unknown_id() {
        let (_dir, conn) = test_db();
        let err = classify_manually(&conn, "nope", &ManualClassification::default()).unwrap_err();
        assert!(matches!(err, SchedcError::UnknownTransaction(_)));
    }

    #[test]
    fn test_personal_rows_are_not_candidates() {
        let (_dir, conn) = test_db();
        let id = add_business_txn(&conn, "GROCERY", 1);
        conn.set_business(&[id.clone()], false).unwrap();
        let classifier = FakeClassifier::answering(22);
        let summary = auto_categorize(&conn, Some(&classifier)).unwrap();
        assert_eq!(summary.candidates, 0);
        assert_eq!(conn.get_transaction(&id).unwrap().unwrap().category, "uncategorized");
    }
}
