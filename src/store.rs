use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{Result, SchedcError};
use crate::models::{
    is_valid_line, CanonicalTransaction, Classification, ClassifiedBy, DeductionData,
    ManualClassification, ScheduleCCategory, TransactionType, UploadBatch, UploadSource,
    VendorRule,
};

/// Everything the core reads from or writes to persistent storage.
///
/// Each method is a single statement (or a short run of them) with no
/// transaction spanning calls; concurrent writers are serialized by SQLite.
pub trait Store {
    fn insert_transaction(&self, tx: &CanonicalTransaction) -> Result<()>;
    fn insert_upload_batch(&self, batch: &UploadBatch) -> Result<()>;
    fn get_transaction(&self, id: &str) -> Result<Option<CanonicalTransaction>>;
    fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<CanonicalTransaction>>;

    /// Business rows still waiting for a category or a line, newest first.
    /// Manually classified rows are never candidates.
    fn classification_candidates(&self) -> Result<Vec<CanonicalTransaction>>;
    /// Returns false when the id is unknown or the row was classified by hand.
    fn update_classification(&self, id: &str, c: &Classification, by: ClassifiedBy) -> Result<bool>;
    fn apply_manual_classification(&self, id: &str, edit: &ManualClassification) -> Result<bool>;

    fn set_business(&self, ids: &[String], is_business: bool) -> Result<usize>;
    fn set_business_where(
        &self,
        card: Option<&str>,
        transaction_type: Option<TransactionType>,
        is_business: bool,
    ) -> Result<usize>;

    fn upsert_vendor_rule(&self, rule: &VendorRule) -> Result<i64>;
    fn vendor_rules(&self) -> Result<Vec<VendorRule>>;
    fn apply_vendor_rule(&self, rule: &VendorRule) -> Result<usize>;

    fn schedule_c_categories(&self) -> Result<Vec<ScheduleCCategory>>;
    fn line_totals(&self, scope: LineScope) -> Result<Vec<LineTotal>>;
    fn business_income_total(&self) -> Result<f64>;
    fn transaction_counts(&self) -> Result<TransactionCounts>;

    fn deductions(&self) -> Result<Option<DeductionData>>;
    fn save_business_miles(&self, miles: i64) -> Result<()>;
    fn save_home_office(&self, sqft: i64, total_sqft: i64, use_simplified: bool) -> Result<()>;

    fn convert_income_to_expense(&self) -> Result<usize>;
    fn clear_all(&self) -> Result<Vec<(&'static str, usize)>>;
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub card: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub business_only: bool,
    pub min_amount: Option<f64>,
    pub limit: Option<usize>,
}

/// Which rows feed a Schedule C line total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineScope {
    Expensable,
    Business,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineTotal {
    pub line: i32,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionCounts {
    pub total: i64,
    pub business_income: i64,
    pub expensable_expense: i64,
    pub business_expense: i64,
    pub personal: i64,
    pub uncategorized: i64,
}

// ---------------------------------------------------------------------------
// SQL conversions
// ---------------------------------------------------------------------------

fn text_column<T>(value: ValueRef<'_>) -> FromSqlResult<T>
where
    T: std::str::FromStr<Err = SchedcError>,
{
    value
        .as_str()?
        .parse()
        .map_err(|e: SchedcError| FromSqlError::Other(Box::new(e)))
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_column(value)
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UploadSource {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_column(value)
    }
}

impl ToSql for UploadSource {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ClassifiedBy {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_column(value)
    }
}

impl ToSql for ClassifiedBy {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

const TX_COLUMNS: &str = "id, date, vendor, amount, card, category, purpose, expensable, type, \
                          source_file, schedule_c_line, is_business, classified_by";

fn row_to_transaction(row: &Row) -> rusqlite::Result<CanonicalTransaction> {
    Ok(CanonicalTransaction {
        id: row.get(0)?,
        date: row.get(1)?,
        vendor: row.get(2)?,
        amount: row.get(3)?,
        card: row.get(4)?,
        category: row.get(5)?,
        purpose: row.get(6)?,
        expensable: row.get(7)?,
        transaction_type: row.get(8)?,
        source_file: row.get(9)?,
        schedule_c_line: row.get(10)?,
        is_business: row.get(11)?,
        classified_by: row.get(12)?,
    })
}

fn row_to_rule(row: &Row) -> rusqlite::Result<VendorRule> {
    Ok(VendorRule {
        id: row.get(0)?,
        vendor: row.get(1)?,
        transaction_type: row.get(2)?,
        expensable: row.get(3)?,
        category: row.get(4)?,
        schedule_c_line: row.get(5)?,
    })
}

fn check_line(line: i32) -> Result<()> {
    if is_valid_line(line) {
        Ok(())
    } else {
        Err(SchedcError::InvalidLine(line))
    }
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

impl Store for Connection {
    fn insert_transaction(&self, tx: &CanonicalTransaction) -> Result<()> {
        self.execute(
            "INSERT INTO transactions (id, date, vendor, amount, card, category, purpose, expensable, \
             type, source_file, schedule_c_line, is_business, classified_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                tx.id,
                tx.date,
                tx.vendor,
                tx.amount,
                tx.card,
                tx.category,
                tx.purpose,
                tx.expensable,
                tx.transaction_type,
                tx.source_file,
                tx.schedule_c_line,
                tx.is_business,
                tx.classified_by,
            ],
        )?;
        Ok(())
    }

    fn insert_upload_batch(&self, batch: &UploadBatch) -> Result<()> {
        self.execute(
            "INSERT INTO upload_batches (id, filename, source, uploaded_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![batch.id, batch.filename, batch.source, batch.uploaded_at],
        )?;
        Ok(())
    }

    fn get_transaction(&self, id: &str) -> Result<Option<CanonicalTransaction>> {
        let sql = format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = ?1");
        Ok(self.query_row(&sql, [id], row_to_transaction).optional()?)
    }

    fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<CanonicalTransaction>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(t) = filter.transaction_type {
            conditions.push("type = ?");
            values.push(Box::new(t));
        }
        if let Some(card) = &filter.card {
            conditions.push("card = ?");
            values.push(Box::new(card.clone()));
        }
        if let Some(category) = &filter.category {
            conditions.push("category = ?");
            values.push(Box::new(category.clone()));
        }
        if let Some(search) = &filter.search {
            conditions.push(
                "(instr(lower(vendor), lower(?)) > 0 OR instr(lower(category), lower(?)) > 0 \
                 OR instr(lower(purpose), lower(?)) > 0)",
            );
            for _ in 0..3 {
                values.push(Box::new(search.clone()));
            }
        }
        if filter.business_only {
            conditions.push("is_business = 1");
        }
        if let Some(min) = filter.min_amount {
            conditions.push("abs(amount) >= ?");
            values.push(Box::new(min));
        }

        let mut sql = format!("SELECT {TX_COLUMNS} FROM transactions");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY date DESC, created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let param_values: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt
            .query_map(param_values.as_slice(), row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn classification_candidates(&self) -> Result<Vec<CanonicalTransaction>> {
        let sql = format!(
            "SELECT {TX_COLUMNS} FROM transactions \
             WHERE is_business = 1 \
               AND (category IN ('uncategorized', '') OR schedule_c_line = 0) \
               AND (classified_by IS NULL OR classified_by <> 'manual') \
             ORDER BY date DESC"
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn update_classification(&self, id: &str, c: &Classification, by: ClassifiedBy) -> Result<bool> {
        check_line(c.schedule_c_line)?;
        let changed = self.execute(
            "UPDATE transactions SET category = ?1, purpose = ?2, expensable = (?3 AND amount > 0), \
             schedule_c_line = ?4, classified_by = ?5 \
             WHERE id = ?6 AND (classified_by IS NULL OR classified_by <> 'manual')",
            rusqlite::params![c.category, c.purpose, c.expensable, c.schedule_c_line, by, id],
        )?;
        Ok(changed > 0)
    }

    fn apply_manual_classification(&self, id: &str, edit: &ManualClassification) -> Result<bool> {
        if let Some(line) = edit.schedule_c_line {
            check_line(line)?;
        }
        let changed = self.execute(
            "UPDATE transactions SET category = COALESCE(?1, category), \
             purpose = COALESCE(?2, purpose), expensable = COALESCE(?3, expensable), \
             schedule_c_line = COALESCE(?4, schedule_c_line), classified_by = 'manual' \
             WHERE id = ?5",
            rusqlite::params![
                edit.category.as_deref().filter(|s| !s.is_empty()),
                edit.purpose.as_deref().filter(|s| !s.is_empty()),
                edit.expensable,
                edit.schedule_c_line,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn set_business(&self, ids: &[String], is_business: bool) -> Result<usize> {
        let mut stmt = self.prepare_cached("UPDATE transactions SET is_business = ?1 WHERE id = ?2")?;
        let mut updated = 0;
        for id in ids {
            updated += stmt.execute(rusqlite::params![is_business, id])?;
        }
        Ok(updated)
    }

    fn set_business_where(
        &self,
        card: Option<&str>,
        transaction_type: Option<TransactionType>,
        is_business: bool,
    ) -> Result<usize> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(is_business)];
        if let Some(card) = card {
            conditions.push("card = ?");
            values.push(Box::new(card.to_string()));
        }
        if let Some(t) = transaction_type {
            conditions.push("type = ?");
            values.push(Box::new(t));
        }
        let mut sql = "UPDATE transactions SET is_business = ?".to_string();
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        let param_values: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        Ok(self.execute(&sql, param_values.as_slice())?)
    }

    fn upsert_vendor_rule(&self, rule: &VendorRule) -> Result<i64> {
        check_line(rule.schedule_c_line)?;
        let id = self.query_row(
            "INSERT INTO vendor_rules (vendor, type, expensable, category, schedule_c_line) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(vendor) DO UPDATE SET type = excluded.type, expensable = excluded.expensable, \
             category = excluded.category, schedule_c_line = excluded.schedule_c_line \
             RETURNING id",
            rusqlite::params![
                rule.vendor,
                rule.transaction_type,
                rule.expensable,
                rule.category,
                rule.schedule_c_line,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn vendor_rules(&self) -> Result<Vec<VendorRule>> {
        let mut stmt = self.prepare(
            "SELECT id, vendor, type, expensable, category, schedule_c_line \
             FROM vendor_rules ORDER BY created_at DESC, id DESC",
        )?;
        let rules = stmt
            .query_map([], row_to_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    fn apply_vendor_rule(&self, rule: &VendorRule) -> Result<usize> {
        let changed = self.execute(
            "UPDATE transactions SET category = ?1, expensable = (?2 AND amount > 0), \
             schedule_c_line = ?3, type = ?4, classified_by = 'rule' \
             WHERE instr(lower(vendor), lower(?5)) > 0 \
               AND category IN ('uncategorized', '') \
               AND (classified_by IS NULL OR classified_by <> 'manual')",
            rusqlite::params![
                rule.category,
                rule.expensable,
                rule.schedule_c_line,
                rule.transaction_type,
                rule.vendor,
            ],
        )?;
        Ok(changed)
    }

    fn schedule_c_categories(&self) -> Result<Vec<ScheduleCCategory>> {
        let mut stmt = self.prepare(
            "SELECT name, line_number, description FROM schedule_c_categories ORDER BY line_number, id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ScheduleCCategory {
                    name: row.get(0)?,
                    line_number: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn line_totals(&self, scope: LineScope) -> Result<Vec<LineTotal>> {
        let scope_clause = match scope {
            LineScope::Expensable => "expensable = 1",
            LineScope::Business => "is_business = 1",
        };
        let sql = format!(
            "SELECT schedule_c_line, SUM(ABS(amount)) FROM transactions \
             WHERE type = 'expense' AND {scope_clause} AND schedule_c_line > 0 \
             GROUP BY schedule_c_line ORDER BY schedule_c_line"
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LineTotal {
                    line: row.get(0)?,
                    total: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn business_income_total(&self) -> Result<f64> {
        Ok(self.query_row(
            "SELECT COALESCE(SUM(ABS(amount)), 0.0) FROM transactions \
             WHERE type = 'income' AND is_business = 1",
            [],
            |row| row.get(0),
        )?)
    }

    fn transaction_counts(&self) -> Result<TransactionCounts> {
        Ok(self.query_row(
            "SELECT COUNT(*), \
                    COALESCE(SUM(type = 'income' AND is_business = 1), 0), \
                    COALESCE(SUM(type = 'expense' AND expensable = 1), 0), \
                    COALESCE(SUM(type = 'expense' AND is_business = 1), 0), \
                    COALESCE(SUM(is_business = 0), 0), \
                    COALESCE(SUM(category IN ('uncategorized', '')), 0) \
             FROM transactions",
            [],
            |row| {
                Ok(TransactionCounts {
                    total: row.get(0)?,
                    business_income: row.get(1)?,
                    expensable_expense: row.get(2)?,
                    business_expense: row.get(3)?,
                    personal: row.get(4)?,
                    uncategorized: row.get(5)?,
                })
            },
        )?)
    }

    fn deductions(&self) -> Result<Option<DeductionData>> {
        Ok(self
            .query_row(
                "SELECT business_miles, home_office_sqft, total_home_sqft, use_simplified, updated_at \
                 FROM deduction_data WHERE id = 1",
                [],
                |row| {
                    Ok(DeductionData {
                        business_miles: row.get(0)?,
                        home_office_sqft: row.get(1)?,
                        total_home_sqft: row.get(2)?,
                        use_simplified: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    fn save_business_miles(&self, miles: i64) -> Result<()> {
        self.execute(
            "INSERT INTO deduction_data (id, business_miles, updated_at) VALUES (1, ?1, datetime('now')) \
             ON CONFLICT(id) DO UPDATE SET business_miles = excluded.business_miles, \
             updated_at = excluded.updated_at",
            [miles],
        )?;
        Ok(())
    }

    fn save_home_office(&self, sqft: i64, total_sqft: i64, use_simplified: bool) -> Result<()> {
        self.execute(
            "INSERT INTO deduction_data (id, home_office_sqft, total_home_sqft, use_simplified, updated_at) \
             VALUES (1, ?1, ?2, ?3, datetime('now')) \
             ON CONFLICT(id) DO UPDATE SET home_office_sqft = excluded.home_office_sqft, \
             total_home_sqft = excluded.total_home_sqft, use_simplified = excluded.use_simplified, \
             updated_at = excluded.updated_at",
            rusqlite::params![sqft, total_sqft, use_simplified],
        )?;
        Ok(())
    }

    fn convert_income_to_expense(&self) -> Result<usize> {
        Ok(self.execute(
            "UPDATE transactions SET type = 'expense', expensable = (amount > 0) WHERE type = 'income'",
            [],
        )?)
    }

    fn clear_all(&self) -> Result<Vec<(&'static str, usize)>> {
        let tx = self.unchecked_transaction()?;
        let mut cleared = Vec::new();
        for table in ["transactions", "upload_batches", "vendor_rules", "deduction_data"] {
            let deleted = tx.execute(&format!("DELETE FROM {table}"), [])?;
            cleared.push((table, deleted));
        }
        tx.commit()?;
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use chrono::NaiveDate;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn add_txn(conn: &Connection, vendor: &str, amount: f64, is_business: bool) -> String {
        let mut tx = CanonicalTransaction::shell("file-1", "Chase", TransactionType::Expense);
        tx.date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        tx.vendor = vendor.to_string();
        tx.amount = amount;
        tx.expensable = tx.default_expensable();
        tx.is_business = is_business;
        conn.insert_transaction(&tx).unwrap();
        tx.id
    }

    fn classification(category: &str, line: i32, expensable: bool) -> Classification {
        Classification {
            category: category.to_string(),
            schedule_c_line: line,
            expensable,
            purpose: "work".to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let (_dir, conn) = test_db();
        let id = add_txn(&conn, "COFFEE SHOP", 4.5, false);
        let tx = conn.get_transaction(&id).unwrap().unwrap();
        assert_eq!(tx.vendor, "COFFEE SHOP");
        assert_eq!(tx.amount, 4.5);
        assert_eq!(tx.transaction_type, TransactionType::Expense);
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(tx.expensable);
        assert_eq!(tx.classified_by, None);
        assert!(conn.get_transaction("missing").unwrap().is_none());
    }

    #[test]
    fn test_candidates_are_business_and_unclassified() {
        let (_dir, conn) = test_db();
        let business = add_txn(&conn, "ADOBE", 50.0, true);
        add_txn(&conn, "GROCERY", 80.0, false);
        let manual = add_txn(&conn, "UBER", 20.0, true);
        conn.apply_manual_classification(
            &manual,
            &ManualClassification { category: Some("Travel expenses".into()), ..Default::default() },
        )
        .unwrap();

        let ids: Vec<String> = conn
            .classification_candidates()
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![business]);
    }

    #[test]
    fn test_update_classification_never_overwrites_manual() {
        let (_dir, conn) = test_db();
        let id = add_txn(&conn, "UBER", 20.0, true);
        conn.apply_manual_classification(
            &id,
            &ManualClassification {
                category: Some("Travel expenses".into()),
                schedule_c_line: Some(24),
                ..Default::default()
            },
        )
        .unwrap();
        let updated = conn
            .update_classification(&id, &classification("Meals", 24, true), ClassifiedBy::Classifier)
            .unwrap();
        assert!(!updated);
        assert_eq!(conn.get_transaction(&id).unwrap().unwrap().category, "Travel expenses");
    }

    #[test]
    fn test_update_classification_refund_never_expensable() {
        let (_dir, conn) = test_db();
        let id = add_txn(&conn, "REFUND STORE", -30.0, true);
        conn.update_classification(&id, &classification("Supplies", 22, true), ClassifiedBy::Classifier)
            .unwrap();
        let tx = conn.get_transaction(&id).unwrap().unwrap();
        assert!(!tx.expensable);
        assert_eq!(tx.schedule_c_line, 22);
        assert_eq!(tx.classified_by, Some(ClassifiedBy::Classifier));
    }

    #[test]
    fn test_manual_rejects_out_of_range_line() {
        let (_dir, conn) = test_db();
        let id = add_txn(&conn, "UBER", 20.0, true);
        let err = conn
            .apply_manual_classification(
                &id,
                &ManualClassification { schedule_c_line: Some(30), ..Default::default() },
            )
            .unwrap_err();
        assert!(matches!(err, SchedcError::InvalidLine(30)));
    }

    #[test]
    fn test_manual_keeps_unset_fields() {
        let (_dir, conn) = test_db();
        let id = add_txn(&conn, "UBER", 20.0, true);
        conn.apply_manual_classification(
            &id,
            &ManualClassification { purpose: Some("airport".into()), ..Default::default() },
        )
        .unwrap();
        let tx = conn.get_transaction(&id).unwrap().unwrap();
        assert_eq!(tx.purpose, "airport");
        assert_eq!(tx.category, "uncategorized");
        assert!(tx.expensable);
    }

    #[test]
    fn test_vendor_rule_upsert_is_unique_per_vendor() {
        let (_dir, conn) = test_db();
        let mut rule = VendorRule {
            id: None,
            vendor: "ADOBE".into(),
            transaction_type: TransactionType::Expense,
            expensable: true,
            category: "Office expenses".into(),
            schedule_c_line: 18,
        };
        let first = conn.upsert_vendor_rule(&rule).unwrap();
        rule.category = "Supplies".into();
        rule.schedule_c_line = 22;
        let second = conn.upsert_vendor_rule(&rule).unwrap();
        assert_eq!(first, second);
        let rules = conn.vendor_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].category, "Supplies");
    }

    #[test]
    fn test_apply_vendor_rule_matches_substring_case_insensitive() {
        let (_dir, conn) = test_db();
        let hit = add_txn(&conn, "Adobe Creative Cloud", 55.0, false);
        let miss = add_txn(&conn, "GROCERY", 80.0, false);
        let rule = VendorRule {
            id: None,
            vendor: "ADOBE".into(),
            transaction_type: TransactionType::Expense,
            expensable: true,
            category: "Office expenses".into(),
            schedule_c_line: 18,
        };
        assert_eq!(conn.apply_vendor_rule(&rule).unwrap(), 1);
        let tx = conn.get_transaction(&hit).unwrap().unwrap();
        assert_eq!(tx.category, "Office expenses");
        assert_eq!(tx.schedule_c_line, 18);
        assert_eq!(tx.classified_by, Some(ClassifiedBy::Rule));
        assert_eq!(conn.get_transaction(&miss).unwrap().unwrap().category, "uncategorized");
        // Already categorized rows are left alone on a second pass.
        assert_eq!(conn.apply_vendor_rule(&rule).unwrap(), 0);
    }

    #[test]
    fn test_list_transactions_filters() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "ADOBE", 55.0, true);
        add_txn(&conn, "GROCERY", 8.0, false);
        add_txn(&conn, "HOTEL", 300.0, false);

        let all = conn.list_transactions(&TransactionFilter::default()).unwrap();
        assert_eq!(all.len(), 3);

        let business = conn
            .list_transactions(&TransactionFilter { business_only: true, ..Default::default() })
            .unwrap();
        assert_eq!(business.len(), 1);

        let big = conn
            .list_transactions(&TransactionFilter { min_amount: Some(50.0), ..Default::default() })
            .unwrap();
        assert_eq!(big.len(), 2);

        let search = conn
            .list_transactions(&TransactionFilter { search: Some("hot".into()), ..Default::default() })
            .unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].vendor, "HOTEL");

        let limited = conn
            .list_transactions(&TransactionFilter { limit: Some(2), ..Default::default() })
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_set_business_where_filters_by_card() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "ADOBE", 55.0, false);
        add_txn(&conn, "GROCERY", 8.0, false);
        assert_eq!(conn.set_business_where(Some("Amex"), None, true).unwrap(), 0);
        assert_eq!(conn.set_business_where(Some("Chase"), Some(TransactionType::Expense), true).unwrap(), 2);
        assert_eq!(conn.transaction_counts().unwrap().personal, 0);
    }

    #[test]
    fn test_line_totals_by_scope() {
        let (_dir, conn) = test_db();
        let a = add_txn(&conn, "ADOBE", 55.0, true);
        let b = add_txn(&conn, "STAPLES", 20.0, false);
        conn.update_classification(&a, &classification("Office expenses", 18, true), ClassifiedBy::Classifier)
            .unwrap();
        conn.update_classification(&b, &classification("Office expenses", 18, true), ClassifiedBy::Classifier)
            .unwrap();

        let expensable = conn.line_totals(LineScope::Expensable).unwrap();
        assert_eq!(expensable, vec![LineTotal { line: 18, total: 75.0 }]);
        let business = conn.line_totals(LineScope::Business).unwrap();
        assert_eq!(business, vec![LineTotal { line: 18, total: 55.0 }]);
    }

    #[test]
    fn test_deductions_singleton_upsert() {
        let (_dir, conn) = test_db();
        assert!(conn.deductions().unwrap().is_none());
        conn.save_business_miles(1000).unwrap();
        conn.save_home_office(200, 2000, true).unwrap();
        let d = conn.deductions().unwrap().unwrap();
        assert_eq!(d.business_miles, 1000);
        assert_eq!(d.home_office_sqft, 200);
        assert_eq!(d.total_home_sqft, 2000);
        assert!(d.use_simplified);
    }

    #[test]
    fn test_convert_income_to_expense() {
        let (_dir, conn) = test_db();
        let mut tx = CanonicalTransaction::shell("f", "Bank", TransactionType::Income);
        tx.date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        tx.vendor = "CLIENT".into();
        tx.amount = 100.0;
        conn.insert_transaction(&tx).unwrap();
        assert_eq!(conn.convert_income_to_expense().unwrap(), 1);
        let tx = conn.get_transaction(&tx.id).unwrap().unwrap();
        assert_eq!(tx.transaction_type, TransactionType::Expense);
        assert!(tx.expensable);
    }

    #[test]
    fn test_clear_all_reports_counts() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "ADOBE", 55.0, true);
        conn.save_business_miles(10).unwrap();
        let cleared = conn.clear_all().unwrap();
        assert!(cleared.contains(&("transactions", 1)));
        assert!(cleared.contains(&("deduction_data", 1)));
        assert_eq!(conn.transaction_counts().unwrap().total, 0);
        // Seeded categories survive a clear.
        assert!(!conn.schedule_c_categories().unwrap().is_empty());
    }
}
