#[cfg(test)]
mod tests {
    use indoc::indoc;
    use keel::{
        ConfigurationError, ConnectionFailure, ConnectionSession, DriverError, IsolationLevel,
        SessionError, Value,
    };
    use keel_sqlite::{SQLiteDriver, SqliteTransaction};
    use keel_tests::{init_logs, silent_logs};
    use std::{fs, path::Path, sync::Mutex};

    static MUTEX: Mutex<()> = Mutex::new(());

    fn memory() -> ConnectionSession<SQLiteDriver> {
        ConnectionSession::from_url(SQLiteDriver::new(), "sqlite://:memory:")
            .expect("Could not create the session")
    }

    #[test]
    fn create_database() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/creation.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .expect(format!("Failed to remove test database file {}", DB_PATH).as_str());
        }
        let url = |mode: &str| format!("sqlite://{}?mode={}", DB_PATH, mode);
        ConnectionSession::from_url(SQLiteDriver::new(), &url("rwc"))
            .expect("Could not create the session")
            .ensure_open()
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        ConnectionSession::from_url(SQLiteDriver::new(), &url("ro"))
            .expect("Could not create the session")
            .ensure_open()
            .expect("Could not open the database");
        fs::remove_file(DB_PATH)
            .expect(format!("Failed to remove existing test database file {}", DB_PATH).as_str());
        let mut session = ConnectionSession::from_url(SQLiteDriver::new(), &url("ro"))
            .expect("Could not create the session");
        let result = silent_logs! { session.ensure_open() };
        assert!(
            matches!(
                result,
                Err(SessionError::Connection {
                    cause: ConnectionFailure::Driver,
                    ..
                })
            ),
            "Should not be able to open in read only unexisting database"
        );
    }

    #[test]
    fn wrong_url() {
        init_logs();
        assert!(matches!(
            ConnectionSession::from_url(SQLiteDriver::new(), "duckdb://some_value"),
            Err(SessionError::Configuration(
                ConfigurationError::DriverMismatch { .. }
            ))
        ));
        let mut session =
            ConnectionSession::from_url(SQLiteDriver::new(), "sqlite://data.sqlite?mode=sideways")
                .expect("Could not create the session");
        let result = silent_logs! { session.ensure_open() };
        assert!(matches!(
            result,
            Err(SessionError::Connection {
                cause: ConnectionFailure::Unexpected,
                ..
            })
        ));
    }

    #[test]
    fn memory_database() {
        init_logs();
        let mut session = memory();
        let rows = session
            .create_command()
            .expect("Could not create a command")
            .sql(indoc! {"
                WITH numbers(n) AS (VALUES (1), (2), (3))
                SELECT n, n * 1.5 AS half, 'n' || n AS label FROM numbers ORDER BY n
            "})
            .fetch()
            .expect("Could not query the numbers");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].names(), ["n", "half", "label"]);
        assert_eq!(rows[2].values()[0], Value::Int64(Some(3)));
        assert_eq!(rows[2].values()[1], Value::Float64(Some(4.5)));
        assert_eq!(rows[2].values()[2], Value::Varchar(Some("n3".into())));

        let inserted = {
            session
                .create_command()
                .expect("Could not create a command")
                .sql("CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT)")
                .execute()
                .expect("Could not create the table");
            session
                .create_command()
                .expect("Could not create a command")
                .sql("INSERT INTO item (name) VALUES (?), (?)")
                .bind("first")
                .bind("second")
                .execute()
                .expect("Could not insert the items")
        };
        assert_eq!(inserted.rows_affected, 2);
        assert_eq!(inserted.last_affected_id, Some(2));
    }

    #[test]
    fn isolation_levels() {
        init_logs();
        assert_eq!(
            SqliteTransaction::begin_statement(IsolationLevel::Serializable),
            "BEGIN IMMEDIATE"
        );
        assert_eq!(
            SqliteTransaction::begin_statement(IsolationLevel::ReadCommitted),
            "BEGIN DEFERRED"
        );
        let mut session = memory();
        for (isolation_level, expected) in [
            (IsolationLevel::ReadUncommitted, 1),
            (IsolationLevel::Serializable, 0),
        ] {
            let mut scope = session
                .begin_transaction(isolation_level)
                .expect("Could not begin the transaction");
            let value = scope
                .create_command()
                .expect("Could not create a command")
                .sql("PRAGMA read_uncommitted")
                .scalar()
                .expect("Could not read the pragma");
            assert_eq!(value, Some(Value::Int64(Some(expected))));
            scope.commit().expect("Could not commit the transaction");
        }
    }

    #[test]
    fn driver_errors() {
        init_logs();
        let mut session = memory();
        let error = silent_logs! {
            session
                .create_command()
                .expect("Could not create a command")
                .sql("SELECT * FROM missing_table")
                .execute()
                .expect_err("The query should fail")
        };
        let SessionError::Command { source } = &error else {
            panic!("Expected a command error, got {:?}", error);
        };
        let driver_error = source
            .chain()
            .find_map(|e| e.downcast_ref::<DriverError>())
            .expect("The cause should be a driver error");
        assert_eq!(driver_error.code.as_deref(), Some("1"));
        assert!(
            driver_error.message.contains("no such table"),
            "{}",
            driver_error.message
        );

        let result = silent_logs! {
            session
                .create_command()
                .expect("Could not create a command")
                .sql("SELECT 1; SELECT 2")
                .execute()
        };
        assert!(matches!(result, Err(SessionError::Command { .. })));
        session
            .create_command()
            .expect("Could not create a command")
            .sql("SELECT 1;")
            .execute()
            .expect("A trailing semicolon is fine");
    }

    #[test]
    fn close_rolls_back_the_file() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/rollback.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .expect(format!("Failed to remove test database file {}", DB_PATH).as_str());
        }
        let url = format!("sqlite://{}", DB_PATH);
        let mut session = ConnectionSession::from_url(SQLiteDriver::new(), &url)
            .expect("Could not create the session");
        session
            .create_command()
            .expect("Could not create a command")
            .sql("CREATE TABLE ledger (amount INTEGER)")
            .execute()
            .expect("Could not create the table");
        {
            let mut scope = session
                .begin_transaction(IsolationLevel::Serializable)
                .expect("Could not begin the transaction");
            scope
                .create_command()
                .expect("Could not create a command")
                .sql("INSERT INTO ledger (amount) VALUES (100)")
                .execute()
                .expect("Could not insert");
        }
        drop(session);

        let mut session = ConnectionSession::from_url(SQLiteDriver::new(), &url)
            .expect("Could not create the session");
        let count = session
            .create_command()
            .expect("Could not create a command")
            .sql("SELECT COUNT(*) FROM ledger")
            .scalar()
            .expect("Could not count the rows");
        assert_eq!(count, Some(Value::Int64(Some(0))));
    }
}
