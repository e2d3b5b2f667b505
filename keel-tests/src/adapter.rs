use crate::session;
use keel::{DataAdapter, Driver};
use std::sync::Mutex;

static MUTEX: Mutex<()> = Mutex::new(());

pub fn adapter<D: Driver + Clone>(driver: &D, url: &str) {
    let _lock = MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let mut session = session(driver, url);
    let mut adapter = session.create_data_adapter();

    // Setup
    session
        .create_command()
        .expect("Could not create a command")
        .sql("DROP TABLE IF EXISTS keel_adapter")
        .execute()
        .expect("Failed to drop keel_adapter");
    session
        .create_command()
        .expect("Could not create a command")
        .sql("CREATE TABLE keel_adapter (id INTEGER, label VARCHAR(16))")
        .execute()
        .expect("Failed to create keel_adapter");
    for id in 1..=4 {
        session
            .create_command()
            .expect("Could not create a command")
            .sql("INSERT INTO keel_adapter (id, label) VALUES (?, ?)")
            .bind(id)
            .bind(format!("row {}", id))
            .execute()
            .expect("Failed to insert a row");
    }

    let filled = session
        .create_command()
        .expect("Could not create a command")
        .sql("SELECT id, label FROM keel_adapter WHERE id > ? ORDER BY id")
        .bind(1)
        .fill(&mut adapter)
        .expect("Failed to fill the adapter");
    assert_eq!(filled, 3);
    let filled = adapter
        .fill(Vec::new())
        .expect("Filling with nothing must succeed");
    assert_eq!(filled, 0);
}
