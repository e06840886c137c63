//! End-to-end tests: SQLite driving registered backends through the VFS
//! adapter

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use rusqlite::{params, OpenFlags};

use plugfs::{
    open_db, open_db_with_flags, register_backend, unregister_backend, Backend, FileHandle,
    MemBackend, OpenOptions, Result as PlugfsResult,
};

// VFS registration is global in SQLite; serialize the tests that touch it.
static VFS_TEST_LOCK: StdMutex<()> = StdMutex::new(());

#[test]
fn create_insert_select_round_trips() {
    let _guard = VFS_TEST_LOCK.lock().unwrap();
    register_backend("mem-e2e", Arc::new(MemBackend::new())).unwrap();

    let conn = open_db("app.db", "mem-e2e").unwrap();
    conn.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE
        )",
        [],
    )
    .unwrap();

    let inserted = vec![
        (1i64, "Alice".to_owned(), "alice@example.com".to_owned()),
        (2, "Bob".to_owned(), "bob@example.com".to_owned()),
        (3, "Charlie".to_owned(), "charlie@example.com".to_owned()),
    ];
    for (id, name, email) in &inserted {
        conn.execute(
            "INSERT INTO users (id, name, email) VALUES (?1, ?2, ?3)",
            params![id, name, email],
        )
        .unwrap();
    }

    let mut stmt = conn
        .prepare("SELECT id, name, email FROM users ORDER BY id")
        .unwrap();
    let selected: Vec<(i64, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(selected, inserted);

    drop(stmt);
    drop(conn);
    unregister_backend("mem-e2e").unwrap();
}

#[test]
fn data_persists_across_connections() {
    let _guard = VFS_TEST_LOCK.lock().unwrap();
    register_backend("mem-persist", Arc::new(MemBackend::new())).unwrap();

    {
        let conn = open_db("persist.db", "mem-persist").unwrap();
        conn.execute(
            "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT, price REAL)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO products (name, price) VALUES ('Widget', 19.99)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO products (name, price) VALUES ('Gadget', 29.99)",
            [],
        )
        .unwrap();
        conn.close().unwrap();
    }

    {
        let conn = open_db("persist.db", "mem-persist").unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let total: f64 = conn
            .query_row("SELECT SUM(price) FROM products", [], |row| row.get(0))
            .unwrap();
        assert!((total - 49.98).abs() < 0.01);
    }

    unregister_backend("mem-persist").unwrap();
}

#[test]
fn auto_vacuum_truncates_without_corrupting_later_opens() {
    let _guard = VFS_TEST_LOCK.lock().unwrap();
    register_backend("mem-vacuum", Arc::new(MemBackend::new())).unwrap();

    {
        let conn = open_db("shrink.db", "mem-vacuum").unwrap();
        // Must be set before the first table is created.
        conn.execute_batch("PRAGMA auto_vacuum = FULL;").unwrap();

        conn.execute("CREATE TABLE bulk (id INTEGER PRIMARY KEY, data BLOB)", [])
            .unwrap();
        let blob = vec![0x5Au8; 1024];
        for i in 0..200 {
            conn.execute("INSERT INTO bulk VALUES (?1, ?2)", params![i, blob])
                .unwrap();
        }

        let before: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap();

        // Auto-vacuum reclaims the pages at commit, via truncate.
        conn.execute("DROP TABLE bulk", []).unwrap();

        let after: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap();
        assert!(after < before, "expected {after} < {before}");

        let ok: String = conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ok, "ok");
        drop(conn);
    }

    // The truncated database reopens cleanly.
    {
        let conn = open_db("shrink.db", "mem-vacuum").unwrap();
        let ok: String = conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ok, "ok");
    }

    unregister_backend("mem-vacuum").unwrap();
}

#[test]
fn duplicate_backend_registration_is_rejected() {
    let _guard = VFS_TEST_LOCK.lock().unwrap();
    register_backend("mem-dup", Arc::new(MemBackend::new())).unwrap();

    let err = register_backend("mem-dup", Arc::new(MemBackend::new())).unwrap_err();
    assert!(matches!(err, plugfs::PlugfsError::DuplicateName(_)));

    unregister_backend("mem-dup").unwrap();

    // Unregistering again, or a name never registered, is a no-op.
    unregister_backend("mem-dup").unwrap();
    unregister_backend("never-registered").unwrap();
}

#[test]
fn open_with_unregistered_name_fails() {
    let _guard = VFS_TEST_LOCK.lock().unwrap();
    let result = open_db_with_flags("nope.db", "no-such-backend", OpenFlags::default());
    assert!(result.is_err());
}

#[derive(Debug)]
struct CountingBackend {
    inner: MemBackend,
    target: String,
    opens: AtomicUsize,
}

impl Backend for CountingBackend {
    fn open(&self, path: &str, opts: OpenOptions) -> PlugfsResult<FileHandle> {
        if path == self.target {
            self.opens.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.open(path, opts)
    }

    fn delete(&self, path: &str) -> PlugfsResult<()> {
        self.inner.delete(path)
    }

    fn exists(&self, path: &str) -> PlugfsResult<bool> {
        self.inner.exists(path)
    }
}

#[test]
fn open_dispatches_to_the_backend_once_per_open() {
    let _guard = VFS_TEST_LOCK.lock().unwrap();
    let counting = Arc::new(CountingBackend {
        inner: MemBackend::new(),
        target: "counted.db".to_owned(),
        opens: AtomicUsize::new(0),
    });
    register_backend("mem-count", counting.clone()).unwrap();

    {
        let conn = open_db("counted.db", "mem-count").unwrap();
        assert_eq!(counting.opens.load(Ordering::SeqCst), 1);

        // Journal traffic targets sibling paths, not the main file.
        conn.execute("CREATE TABLE t (x INTEGER)", []).unwrap();
        assert_eq!(counting.opens.load(Ordering::SeqCst), 1);
    }

    let conn = open_db("counted.db", "mem-count").unwrap();
    assert_eq!(counting.opens.load(Ordering::SeqCst), 2);
    drop(conn);

    unregister_backend("mem-count").unwrap();
}

#[test]
fn concurrent_reader_connections_share_a_backend() {
    let _guard = VFS_TEST_LOCK.lock().unwrap();
    register_backend("mem-readers", Arc::new(MemBackend::new())).unwrap();

    {
        let conn = open_db("shared.db", "mem-readers").unwrap();
        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, value TEXT)", [])
            .unwrap();
        for i in 0..10 {
            conn.execute(
                "INSERT INTO test VALUES (?1, ?2)",
                params![i, format!("value{i}")],
            )
            .unwrap();
        }
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                let conn = open_db_with_flags(
                    "shared.db",
                    "mem-readers",
                    OpenFlags::SQLITE_OPEN_READ_ONLY,
                )
                .unwrap();
                for _ in 0..50 {
                    let count: i64 = conn
                        .query_row("SELECT COUNT(*) FROM test", [], |row| row.get(0))
                        .unwrap();
                    assert_eq!(count, 10);
                }
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }

    unregister_backend("mem-readers").unwrap();
}
