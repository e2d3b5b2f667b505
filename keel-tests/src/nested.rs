use crate::{count_rows, session, silent_logs};
use keel::{Driver, IsolationLevel, SessionError};
use std::sync::Mutex;

static MUTEX: Mutex<()> = Mutex::new(());

pub fn nested<D: Driver + Clone>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let mut session = session(driver, url);

    // Setup
    session
        .create_command()
        .expect("Could not create a command")
        .sql("DROP TABLE IF EXISTS keel_nested")
        .execute()
        .expect("Failed to drop keel_nested");
    session
        .create_command()
        .expect("Could not create a command")
        .sql("CREATE TABLE keel_nested (level INTEGER)")
        .execute()
        .expect("Failed to create keel_nested");

    // Inner levels join the outer transaction
    {
        let mut outer = session
            .begin_transaction(IsolationLevel::ReadCommitted)
            .expect("Could not begin the outer transaction");
        outer
            .create_command()
            .expect("Could not create a command")
            .sql("INSERT INTO keel_nested (level) VALUES (1)")
            .execute()
            .expect("Failed to insert at level 1");
        {
            let mut inner = outer
                .begin_transaction(IsolationLevel::ReadCommitted)
                .expect("Could not begin the inner transaction");
            assert_eq!(inner.depth(), 2);
            inner
                .create_command()
                .expect("Could not create a command")
                .sql("INSERT INTO keel_nested (level) VALUES (2)")
                .execute()
                .expect("Failed to insert at level 2");
            inner.commit().expect("Failed to commit the inner level");
        }
        assert_eq!(outer.session().transaction_depth(), 1);
        outer.commit().expect("Failed to commit the outer level");
    }
    assert_eq!(session.transaction_depth(), 0);
    assert_eq!(count_rows(driver, url, "keel_nested"), 2);

    // An inner rollback does not undo the outer commit
    {
        let mut outer = session
            .begin_transaction(IsolationLevel::ReadCommitted)
            .expect("Could not begin the outer transaction");
        outer
            .create_command()
            .expect("Could not create a command")
            .sql("INSERT INTO keel_nested (level) VALUES (1)")
            .execute()
            .expect("Failed to insert at level 1");
        outer
            .begin_transaction(IsolationLevel::ReadCommitted)
            .expect("Could not begin the inner transaction")
            .rollback()
            .expect("Failed to roll back the inner level");
        outer.commit().expect("Failed to commit the outer level");
    }
    assert_eq!(session.transaction_depth(), 0);
    assert_eq!(count_rows(driver, url, "keel_nested"), 3);

    // An abandoned inner level blocks the outer commit
    {
        let mut outer = session
            .begin_transaction(IsolationLevel::ReadCommitted)
            .expect("Could not begin the outer transaction");
        outer
            .create_command()
            .expect("Could not create a command")
            .sql("INSERT INTO keel_nested (level) VALUES (1)")
            .execute()
            .expect("Failed to insert at level 1");
        drop(
            outer
                .begin_transaction(IsolationLevel::ReadCommitted)
                .expect("Could not begin the inner transaction"),
        );
        let result = silent_logs! { outer.commit() };
        assert!(matches!(
            result,
            Err(SessionError::UnfinishedNestedTransaction { .. })
        ));
        outer.rollback().expect("Failed to roll back the outer level");
    }
    assert_eq!(session.transaction_depth(), 0);
    assert_eq!(count_rows(driver, url, "keel_nested"), 3);
}
