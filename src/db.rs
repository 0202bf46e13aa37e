use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    vendor TEXT NOT NULL CHECK (vendor <> ''),
    amount REAL NOT NULL,
    card TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT 'uncategorized',
    purpose TEXT NOT NULL DEFAULT '',
    expensable INTEGER NOT NULL DEFAULT 0,
    type TEXT NOT NULL,
    source_file TEXT NOT NULL,
    schedule_c_line INTEGER NOT NULL DEFAULT 0
        CHECK (schedule_c_line = 0 OR schedule_c_line BETWEEN 8 AND 27),
    is_business INTEGER NOT NULL DEFAULT 0,
    classified_by TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_transactions_business
    ON transactions (is_business, category, schedule_c_line);

CREATE TABLE IF NOT EXISTS upload_batches (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    source TEXT NOT NULL,
    uploaded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vendor_rules (
    id INTEGER PRIMARY KEY,
    vendor TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL,
    expensable INTEGER NOT NULL DEFAULT 0,
    category TEXT NOT NULL,
    schedule_c_line INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS deduction_data (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    business_miles INTEGER NOT NULL DEFAULT 0,
    home_office_sqft INTEGER NOT NULL DEFAULT 0,
    total_home_sqft INTEGER NOT NULL DEFAULT 0,
    use_simplified INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS schedule_c_categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    line_number INTEGER NOT NULL,
    description TEXT NOT NULL
);
";

// (name, line_number, description). These are the only answers the classifier
// is allowed to give.
pub const SCHEDULE_C_CATEGORIES: &[(&str, i32, &str)] = &[
    ("Advertising", 8, "Advertising and marketing expenses"),
    ("Car and truck", 9, "Vehicle expenses for business use"),
    ("Commissions and fees", 10, "Commissions and fees paid"),
    ("Contractors", 11, "Contract labor and contractor expenses"),
    ("Insurance", 15, "Business insurance expenses"),
    ("Interest paid", 16, "Business interest payments"),
    ("Legal fees and professional services", 17, "Legal and professional services"),
    ("Office expenses", 18, "Office supplies and expenses"),
    ("Rent and lease", 20, "Rent or lease of business property and equipment"),
    ("Repairs and maintenance", 21, "Repairs and maintenance expenses"),
    ("Supplies", 22, "Business supplies and materials"),
    ("Taxes and licenses", 23, "Business taxes and licenses"),
    ("Travel expenses", 24, "Business travel expenses"),
    ("Meals", 24, "Business meals"),
    ("Utilities", 25, "Business utilities and communications"),
    ("Other business expenses", 27, "Other miscellaneous business expenses"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 =
        conn.query_row("SELECT count(*) FROM schedule_c_categories", [], |row| row.get(0))?;
    if count == 0 {
        for (name, line, description) in SCHEDULE_C_CATEGORIES {
            conn.execute(
                "INSERT INTO schedule_c_categories (name, line_number, description) VALUES (?1, ?2, ?3)",
                rusqlite::params![name, line, description],
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &[
            "transactions",
            "upload_batches",
            "vendor_rules",
            "deduction_data",
            "schedule_c_categories",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM schedule_c_categories", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, SCHEDULE_C_CATEGORIES.len() as i64);
    }

    #[test]
    fn test_seeded_lines_are_in_range() {
        let (_dir, conn) = test_db();
        let out_of_range: i64 = conn
            .query_row(
                "SELECT count(*) FROM schedule_c_categories WHERE line_number NOT BETWEEN 8 AND 27",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(out_of_range, 0);
    }

    #[test]
    fn test_line_check_constraint_rejects_out_of_range() {
        let (_dir, conn) = test_db();
        let err = conn.execute(
            "INSERT INTO transactions (id, date, vendor, amount, type, source_file, schedule_c_line) \
             VALUES ('t1', '2024-01-15', 'ACME', 1.0, 'expense', 'f1', 99)",
            [],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_only_one_deduction_row() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO deduction_data (id) VALUES (1)", []).unwrap();
        assert!(conn.execute("INSERT INTO deduction_data (id) VALUES (2)", []).is_err());
    }
}
