use mchannel_db::{create_pool, run_migrations, DbRuntimeSettings};
use tempfile::TempDir;

#[test]
fn db_initialization_works() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("mchannel.db");
    let pool = create_pool(
        path.to_str().expect("temp path should be utf-8"),
        DbRuntimeSettings::default(),
    )
    .expect("failed to create pool");

    let conn = pool.get().expect("failed to get connection");
    let applied = run_migrations(&conn).expect("failed to run migrations");
    assert_eq!(applied, 6);

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '\\_%' ESCAPE '\\'
             ORDER BY name",
        )
        .expect("failed to prepare table query");
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .expect("failed to execute table query")
        .map(|r| r.expect("failed to read table name"))
        .collect();

    assert_eq!(
        tables,
        vec![
            "courses",
            "event_attendance",
            "events",
            "interests",
            "messages",
            "participants",
        ]
    );
}

#[test]
fn pooled_connections_share_a_file_database() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("shared.db");
    let pool = create_pool(
        path.to_str().expect("temp path should be utf-8"),
        DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 2,
        },
    )
    .expect("failed to create pool");

    let first = pool.get().expect("first connection");
    run_migrations(&first).expect("migrations should succeed");
    first
        .execute(
            "INSERT INTO courses (title) VALUES ('Resilience')",
            [],
        )
        .expect("insert should succeed");

    let second = pool.get().expect("second connection");
    let mode: String = second
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("should query journal_mode");
    assert_eq!(mode, "wal");

    let count: i64 = second
        .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))
        .expect("should count courses");
    assert_eq!(count, 1);
}
