#[cfg(test)]
mod tests {
    use keel::{
        ConfigurationError, ConfigurationRegistry, ConnectionFailure, ConnectionSession,
        ConnectionState, IsolationLevel, SessionError, SessionState,
    };
    use keel_tests::{
        init_logs,
        mock::{Event, Fault, MockDriver, Operation},
        silent_logs,
    };
    use std::error::Error as _;

    fn session(driver: &MockDriver) -> ConnectionSession<MockDriver> {
        ConnectionSession::new(driver.clone(), MockDriver::configuration())
            .expect("Could not create the session")
    }

    #[test]
    fn lazy_open() {
        init_logs();
        let driver = MockDriver::new();
        let mut session = session(&driver);
        assert_eq!(session.state(), SessionState::Unopened);
        assert_eq!(session.connection_state(), None);
        assert!(driver.events().is_empty());

        session.ensure_open().expect("Could not open the session");
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.connection_state(), Some(ConnectionState::Open));
        assert_eq!(
            driver.events(),
            [
                Event::Created {
                    connection_string: "Server=mock;Database=keel;Pwd=secret".into()
                },
                Event::Open {
                    connection_string: "Server=mock;Database=keel;Pwd=secret".into()
                },
            ]
        );
    }

    #[test]
    fn ensure_open_is_idempotent() {
        init_logs();
        let driver = MockDriver::new();
        let mut session = session(&driver);
        for _ in 0..5 {
            session.ensure_open().expect("Could not open the session");
        }
        assert_eq!(driver.count(|e| matches!(e, Event::Created { .. })), 1);
        assert_eq!(driver.count(|e| matches!(e, Event::Open { .. })), 1);

        // An open session keeps its transaction
        let scope = session
            .begin_transaction_default()
            .expect("Could not begin a transaction");
        drop(scope);
        session.ensure_open().expect("Could not open the session");
        assert_eq!(session.transaction_depth(), 1);
    }

    #[test]
    fn close_and_reopen_reuse_the_handle() {
        init_logs();
        let driver = MockDriver::new();
        let mut session = session(&driver);
        session.close().expect("Closing an unopened session is a no-op");
        assert_eq!(session.state(), SessionState::Unopened);
        assert!(driver.events().is_empty());

        session.ensure_open().expect("Could not open the session");
        session.close().expect("Could not close the session");
        session.close().expect("Closing twice is a no-op");
        assert_eq!(session.state(), SessionState::Closed);
        session.ensure_open().expect("Could not reopen the session");
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(driver.count(|e| matches!(e, Event::Created { .. })), 1);
        assert_eq!(driver.count(|e| matches!(e, Event::Open { .. })), 2);
        assert_eq!(driver.count(|e| *e == Event::Close), 1);
    }

    #[test]
    fn broken_connection_is_reopened() {
        init_logs();
        let driver = MockDriver::new();
        let mut session = session(&driver);
        session.ensure_open().expect("Could not open the session");
        driver.break_connections();
        assert_eq!(session.connection_state(), Some(ConnectionState::Broken));
        session.ensure_open().expect("Could not reopen the session");
        assert_eq!(session.connection_state(), Some(ConnectionState::Open));
        assert_eq!(driver.count(|e| *e == Event::Close), 1);
        assert_eq!(driver.count(|e| matches!(e, Event::Open { .. })), 2);
    }

    #[test]
    fn failing_open() {
        init_logs();
        let driver = MockDriver::new();
        driver.fail(Operation::Open, Fault::Driver);
        let mut session = session(&driver);
        let error = silent_logs! {
            session.ensure_open().expect_err("Open should fail")
        };
        let SessionError::Connection { message, cause, .. } = &error else {
            panic!("Expected a connection error, got {:?}", error);
        };
        assert_eq!(*message, "Could not connect to the database");
        assert_eq!(*cause, ConnectionFailure::Driver);
        assert_eq!(
            error.source().map(ToString::to_string).as_deref(),
            Some("Mock Open failure")
        );
        assert_eq!(session.state(), SessionState::Unopened);
        assert_eq!(session.transaction_depth(), 0);

        driver.fail(Operation::Open, Fault::Unexpected);
        let error = silent_logs! {
            session.ensure_open().expect_err("Open should fail")
        };
        assert!(matches!(
            error,
            SessionError::Connection {
                cause: ConnectionFailure::Unexpected,
                ..
            }
        ));

        driver.heal(Operation::Open);
        session.ensure_open().expect("Could not open the session");
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn failing_handle_creation() {
        init_logs();
        let driver = MockDriver::new();
        driver.fail(Operation::Create, Fault::Unexpected);
        let mut session = session(&driver);
        silent_logs! {
            assert!(matches!(
                session.begin_transaction_default(),
                Err(SessionError::Connection { .. })
            ));
        }
        assert_eq!(session.state(), SessionState::Unopened);
        assert_eq!(session.connection_state(), None);
    }

    #[test]
    fn dispose_is_terminal() {
        init_logs();
        let driver = MockDriver::new();
        let mut session = session(&driver);
        session.ensure_open().expect("Could not open the session");
        session.dispose().expect("Could not dispose the session");
        session.dispose().expect("Disposing twice is a no-op");
        assert!(session.is_disposed());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.connection_state(), None);
        silent_logs! {
            assert!(matches!(session.ensure_open(), Err(SessionError::Disposed)));
            assert!(matches!(session.create_command(), Err(SessionError::Disposed)));
            assert!(matches!(
                session.begin_transaction_default(),
                Err(SessionError::Disposed)
            ));
        }
        drop(session);
        assert_eq!(driver.count(|e| *e == Event::Close), 1);
    }

    #[test]
    fn drop_without_open_touches_nothing() {
        init_logs();
        let driver = MockDriver::new();
        drop(session(&driver));
        assert!(driver.events().is_empty());
    }

    #[test]
    fn driver_mismatch() {
        init_logs();
        let result = ConnectionSession::from_url(MockDriver::new(), "sqlite://data.sqlite");
        assert!(matches!(
            result,
            Err(SessionError::Configuration(
                ConfigurationError::DriverMismatch {
                    expected: "mock",
                    ..
                }
            ))
        ));
    }

    #[test]
    fn from_registry() {
        init_logs();
        let mut registry = ConfigurationRegistry::from_urls([("other", "sqlite://data.sqlite")])
            .expect("Could not build the registry");
        registry.insert(
            "main",
            MockDriver::configuration().with_isolation_level(IsolationLevel::Serializable),
        );
        let driver = MockDriver::new();
        let mut session = ConnectionSession::from_registry(driver.clone(), &registry, "main")
            .expect("Could not resolve the main configuration");
        assert_eq!(
            session.configuration().isolation_level(),
            IsolationLevel::Serializable
        );
        let scope = session
            .begin_transaction_default()
            .expect("Could not begin a transaction");
        assert_eq!(scope.isolation_level(), IsolationLevel::Serializable);
        drop(scope);

        silent_logs! {
            assert!(matches!(
                ConnectionSession::from_registry(driver.clone(), &registry, "missing"),
                Err(SessionError::Configuration(ConfigurationError::NotFound { .. }))
            ));
        }
        assert!(matches!(
            ConnectionSession::from_registry(driver, &registry, "other"),
            Err(SessionError::Configuration(
                ConfigurationError::DriverMismatch { .. }
            ))
        ));
    }
}
