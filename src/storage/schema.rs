//! Database schema constants.
//!
//! Every table holds one JSONB document per row. The `id` column mirrors the
//! document's `id` field and `seq` preserves insertion order.

/// SQL schema for the regulation_diffs table.
pub const CREATE_REGULATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS regulation_diffs (
    seq BIGSERIAL,
    id TEXT PRIMARY KEY,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for the findings table.
pub const CREATE_FINDINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS findings (
    seq BIGSERIAL,
    id TEXT PRIMARY KEY,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for the action_items table.
pub const CREATE_ACTION_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS action_items (
    seq BIGSERIAL,
    id TEXT PRIMARY KEY,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Lookup of findings by regulation.
pub const CREATE_FINDINGS_REGULATION_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_findings_regulation_id ON findings ((data ->> 'regulation_id'))
"#;

/// Lookup of action items by finding.
pub const CREATE_ACTION_ITEMS_FINDING_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_action_items_finding_id ON action_items ((data ->> 'finding_id'))
"#;

/// Returns all schema creation statements in the correct order.
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_REGULATIONS_TABLE,
        CREATE_FINDINGS_TABLE,
        CREATE_ACTION_ITEMS_TABLE,
        CREATE_FINDINGS_REGULATION_INDEX,
        CREATE_ACTION_ITEMS_FINDING_INDEX,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Table;

    #[test]
    fn test_every_table_has_a_create_statement() {
        let statements = all_schema_statements();
        for table in Table::ALL {
            let needle = format!("CREATE TABLE IF NOT EXISTS {} (", table.name());
            assert!(
                statements.iter().any(|s| s.contains(&needle)),
                "missing schema for {}",
                table
            );
        }
    }

    #[test]
    fn test_indexes_come_after_tables() {
        let statements = all_schema_statements();
        let first_index = statements
            .iter()
            .position(|s| s.contains("CREATE INDEX"))
            .expect("has indexes");
        assert!(statements[..first_index]
            .iter()
            .all(|s| s.contains("CREATE TABLE")));
    }
}
