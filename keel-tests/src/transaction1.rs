use crate::{count_rows, session};
use keel::{Driver, IsolationLevel};
use std::sync::Mutex;

static MUTEX: Mutex<()> = Mutex::new(());

pub fn transaction1<D: Driver + Clone>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let mut session = session(driver, url);

    // Setup
    session
        .create_command()
        .expect("Could not create a command")
        .sql("DROP TABLE IF EXISTS keel_transaction1")
        .execute()
        .expect("Failed to drop keel_transaction1");
    session
        .create_command()
        .expect("Could not create a command")
        .sql("CREATE TABLE keel_transaction1 (name VARCHAR(64), field INTEGER)")
        .execute()
        .expect("Failed to create keel_transaction1");

    // Committed work is visible to other sessions
    let mut transaction = session
        .begin_transaction_default()
        .expect("Could not begin a transaction");
    assert_eq!(transaction.depth(), 1);
    for (name, field) in [("first", 5832), ("second", 48826), ("third", 48826)] {
        let mut command = transaction
            .create_command()
            .expect("Could not create a command")
            .sql("INSERT INTO keel_transaction1 (name, field) VALUES (?, ?)")
            .bind(name)
            .bind(field);
        assert!(command.is_transactional());
        command.execute().expect("Failed to insert a row");
    }
    transaction
        .commit()
        .expect("Failed to commit the transaction");
    assert!(transaction.is_finalized());
    drop(transaction);
    assert_eq!(session.transaction_depth(), 0);
    assert!(!session.in_transaction());
    assert_eq!(count_rows(driver, url, "keel_transaction1"), 3);

    // Rolled back work is discarded
    let mut transaction = session
        .begin_transaction(IsolationLevel::Serializable)
        .expect("Could not begin a serializable transaction");
    transaction
        .create_command()
        .expect("Could not create a command")
        .sql("DELETE FROM keel_transaction1")
        .execute()
        .expect("Failed to delete the rows");
    transaction
        .rollback()
        .expect("Failed to roll back the transaction");
    drop(transaction);
    assert_eq!(session.transaction_depth(), 0);
    assert_eq!(count_rows(driver, url, "keel_transaction1"), 3);

    // Low level demarcation
    session
        .begin_transaction(IsolationLevel::ReadCommitted)
        .expect("Could not begin a transaction")
        .commit()
        .expect("Failed to commit an empty transaction");
    assert_eq!(session.transaction_depth(), 0);
}
