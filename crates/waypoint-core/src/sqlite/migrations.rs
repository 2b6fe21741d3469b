#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "initial_conversation_schema",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS conversation_turns (
    turn_id INTEGER PRIMARY KEY,
    query TEXT NOT NULL,
    quick_response TEXT NOT NULL,
    complete_response TEXT NOT NULL,
    quick_ms INTEGER NOT NULL,
    complete_ms INTEGER NOT NULL,
    created_at_unix INTEGER NOT NULL
);
"#,
    down_sql: r#"
DROP TABLE IF EXISTS conversation_turns;
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "index_turns_by_time",
    up_sql: r#"
CREATE INDEX IF NOT EXISTS idx_conversation_turns_time
    ON conversation_turns (created_at_unix DESC, turn_id DESC);
"#,
    down_sql: r#"
DROP INDEX IF EXISTS idx_conversation_turns_time;
"#,
};

const MIGRATIONS: [SqliteMigration; 2] = [MIGRATION_0001, MIGRATION_0002];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SqliteMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}
