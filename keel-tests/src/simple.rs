use crate::{count_rows, session};
use indoc::indoc;
use keel::{Driver, SessionState, Value};
use std::sync::Mutex;

static MUTEX: Mutex<()> = Mutex::new(());

pub fn simple<D: Driver + Clone>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let mut session = session(driver, url);
    assert_eq!(session.state(), SessionState::Unopened);

    // Setup
    session
        .create_command()
        .expect("Could not create a command")
        .sql("DROP TABLE IF EXISTS keel_simple")
        .execute()
        .expect("Failed to drop keel_simple");
    assert_eq!(session.state(), SessionState::Open);
    session
        .create_command()
        .expect("Could not create a command")
        .sql(indoc! {"
            CREATE TABLE keel_simple (
                id INTEGER PRIMARY KEY,
                name VARCHAR(64),
                score DOUBLE PRECISION,
                active BOOLEAN,
                payload BLOB
            )
        "})
        .execute()
        .expect("Failed to create keel_simple");
    session.ensure_open().expect("ensure_open must be idempotent");
    session.ensure_open().expect("ensure_open must be idempotent");
    assert_eq!(session.state(), SessionState::Open);

    // Insert outside of any transaction
    let mut insert = session
        .create_command()
        .expect("Could not create a command")
        .sql("INSERT INTO keel_simple (id, name, score, active, payload) VALUES (?, ?, ?, ?, ?)")
        .bind(1)
        .bind("Alpha")
        .bind(12.5)
        .bind(true)
        .bind(&b"\x00\x01\x02"[..]);
    assert!(!insert.is_transactional());
    let result = insert.execute().expect("Failed to insert the first row");
    assert_eq!(result.rows_affected, 1);
    session
        .create_command()
        .expect("Could not create a command")
        .sql("INSERT INTO keel_simple (id, name, score, active, payload) VALUES (?, ?, ?, ?, ?)")
        .bind(2)
        .bind(Option::<&str>::None)
        .bind(Option::<f64>::None)
        .bind(false)
        .bind(Value::Null)
        .execute()
        .expect("Failed to insert the second row");

    // Read back
    let rows = session
        .create_command()
        .expect("Could not create a command")
        .sql("SELECT id, name, score, payload FROM keel_simple ORDER BY id")
        .fetch()
        .expect("Failed to select from keel_simple");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].names(), ["id", "name", "score", "payload"]);
    assert_eq!(rows[0].values()[0], Value::Int64(Some(1)));
    assert_eq!(rows[0].get_column("name"), Some(&Value::Varchar(Some("Alpha".into()))));
    assert_eq!(rows[0].values()[2], Value::Float64(Some(12.5)));
    assert_eq!(
        rows[0].values()[3],
        Value::Blob(Some(vec![0u8, 1, 2].into_boxed_slice()))
    );
    assert!(rows[1].values()[1].is_null());
    assert!(rows[1].values()[3].is_null());

    let name = session
        .create_command()
        .expect("Could not create a command")
        .sql("SELECT name FROM keel_simple WHERE id = ?")
        .bind(1)
        .scalar()
        .expect("Failed to read the name")
        .map(String::try_from)
        .transpose()
        .expect("The name should be a string");
    assert_eq!(name.as_deref(), Some("Alpha"));
    let missing = session
        .create_command()
        .expect("Could not create a command")
        .sql("SELECT name FROM keel_simple WHERE id = ?")
        .bind(404)
        .scalar()
        .expect("Failed to read the name");
    assert_eq!(missing, None);

    // Reopen after an explicit close
    session.close().expect("Failed to close the session");
    assert_eq!(session.state(), SessionState::Closed);
    session.close().expect("Closing twice must be a no-op");
    assert_eq!(count_rows(driver, url, "keel_simple"), 2);
    session.ensure_open().expect("Failed to reopen the session");
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(session.transaction_depth(), 0);
    session.dispose().expect("Failed to dispose the session");
    assert!(session.is_disposed());
}
