#[cfg(test)]
mod tests {
    use keel::{ConnectionSession, SessionError, blocking::run_blocking};
    use keel_tests::{
        init_logs,
        mock::{Event, MockDriver},
        silent_logs,
    };

    fn session(driver: &MockDriver) -> ConnectionSession<MockDriver> {
        ConnectionSession::new(driver.clone(), MockDriver::configuration())
            .expect("Could not create the session")
    }

    #[tokio::test]
    async fn session_comes_back() {
        init_logs();
        let driver = MockDriver::new();
        let (mut session, affected) = run_blocking(session(&driver), |session| {
            let mut scope = session.begin_transaction_default()?;
            let result = scope
                .create_command()?
                .sql("UPDATE accounts SET balance = balance - 10")
                .execute()?;
            scope.commit()?;
            Ok(result.rows_affected)
        })
        .await
        .expect("The blocking work failed");
        assert_eq!(affected, 1);
        assert_eq!(session.transaction_depth(), 0);
        assert_eq!(driver.events().last(), Some(&Event::Commit { id: 1 }));
        session.dispose().expect("Could not dispose the session");
    }

    #[tokio::test]
    async fn failure_drops_the_session() {
        init_logs();
        let driver = MockDriver::new();
        let result = silent_logs! {
            run_blocking(session(&driver), |session| {
                let scope = session.begin_transaction_default()?;
                drop(scope);
                Err::<(), _>(SessionError::NoActiveTransaction)
            })
            .await
        };
        assert!(matches!(result, Err(SessionError::NoActiveTransaction)));
        let events = driver.events();
        assert_eq!(&events[events.len() - 2..], [Event::Rollback { id: 1 }, Event::Close]);
    }

    #[tokio::test]
    async fn panic_is_reported() {
        init_logs();
        let driver = MockDriver::new();
        let result = silent_logs! {
            run_blocking(session(&driver), |session| -> Result<(), SessionError> {
                let _scope = session.begin_transaction_default()?;
                panic!("worker gave up");
            })
            .await
        };
        assert!(matches!(result, Err(SessionError::WorkerCrashed)));
        let events = driver.events();
        assert_eq!(&events[events.len() - 2..], [Event::Rollback { id: 1 }, Event::Close]);
    }
}
