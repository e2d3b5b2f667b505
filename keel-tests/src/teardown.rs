use crate::{count_rows, session};
use keel::{Driver, SessionError, SessionState};
use std::sync::Mutex;

static MUTEX: Mutex<()> = Mutex::new(());

pub fn teardown<D: Driver + Clone>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let mut session = session(driver, url);

    // Setup
    session
        .create_command()
        .expect("Could not create a command")
        .sql("DROP TABLE IF EXISTS keel_teardown")
        .execute()
        .expect("Failed to drop keel_teardown");
    session
        .create_command()
        .expect("Could not create a command")
        .sql("CREATE TABLE keel_teardown (id INTEGER)")
        .execute()
        .expect("Failed to create keel_teardown");

    // Closing with an unfinished transaction rolls it back
    {
        let mut transaction = session
            .begin_transaction_default()
            .expect("Could not begin a transaction");
        transaction
            .create_command()
            .expect("Could not create a command")
            .sql("INSERT INTO keel_teardown (id) VALUES (1)")
            .execute()
            .expect("Failed to insert a row");
    }
    assert_eq!(session.transaction_depth(), 1);
    session.close().expect("Failed to close the session");
    assert_eq!(session.transaction_depth(), 0);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(count_rows(driver, url, "keel_teardown"), 0);

    // A failed command followed by drop leaves nothing behind
    {
        let mut session = crate::session(driver, url);
        let mut transaction = session
            .begin_transaction_default()
            .expect("Could not begin a transaction");
        transaction
            .create_command()
            .expect("Could not create a command")
            .sql("INSERT INTO keel_teardown (id) VALUES (2)")
            .execute()
            .expect("Failed to insert a row");
        let result = transaction
            .create_command()
            .expect("Could not create a command")
            .sql("INSERT INTO keel_missing_table (id) VALUES (3)")
            .execute();
        assert!(matches!(result, Err(SessionError::Command { .. })));
    }
    assert_eq!(count_rows(driver, url, "keel_teardown"), 0);

    // A disposed session refuses to work
    session.dispose().expect("Failed to dispose the session");
    assert!(matches!(session.ensure_open(), Err(SessionError::Disposed)));
    assert!(matches!(
        session.begin_transaction_default(),
        Err(SessionError::Disposed)
    ));
}
