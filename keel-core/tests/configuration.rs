#[cfg(test)]
mod tests {
    use keel_core::{
        Configuration, ConfigurationError, ConfigurationRegistry, IsolationLevel, Locale,
    };

    #[test]
    fn from_url() {
        let configuration =
            Configuration::from_url("sqlite:///tmp/keel%20data.sqlite?mode=rwc").unwrap();
        assert_eq!(configuration.driver(), "sqlite");
        assert_eq!(
            configuration.connection_string(),
            "/tmp/keel data.sqlite?mode=rwc"
        );
        assert_eq!(
            configuration.isolation_level(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(configuration.locale(), Locale::English);

        let memory = Configuration::from_url("sqlite://:memory:").unwrap();
        assert_eq!(memory.connection_string(), ":memory:");
    }

    #[test]
    fn malformed_url() {
        for url in ["no scheme here", "sqlite://", "://path", "1sqlite://path"] {
            assert!(
                matches!(
                    Configuration::from_url(url),
                    Err(ConfigurationError::Malformed { .. })
                ),
                "`{}` should be rejected",
                url
            );
        }
    }

    #[test]
    fn builder() {
        let configuration = Configuration::new("mock", "Server=db;Pwd=secret")
            .with_isolation_level(IsolationLevel::Serializable)
            .with_locale(Locale::Portuguese);
        assert_eq!(configuration.isolation_level(), IsolationLevel::Serializable);
        assert_eq!(
            configuration.locale().connection_failed(),
            "Não foi possível se conectar ao banco de dados"
        );
        assert!(configuration.expect_driver("mock").is_ok());
        assert_eq!(
            configuration.expect_driver("sqlite"),
            Err(ConfigurationError::DriverMismatch {
                expected: "sqlite",
                found: "mock".into(),
            })
        );
    }

    #[test]
    fn registry() {
        let registry = ConfigurationRegistry::from_urls([
            ("main", "sqlite://main.sqlite"),
            ("reports", "sqlite://reports.sqlite?mode=ro"),
        ])
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.resolve("reports").unwrap().connection_string(),
            "reports.sqlite?mode=ro"
        );
        assert_eq!(
            registry.resolve("missing"),
            Err(ConfigurationError::NotFound {
                name: "missing".into()
            })
        );
    }

    #[test]
    fn registry_from_vars() {
        let vars = [
            ("KEEL_DB_MAIN", "sqlite://main.sqlite"),
            ("KEEL_DB_", "sqlite://ignored.sqlite"),
            ("HOME", "/root"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()));
        let registry = ConfigurationRegistry::from_vars("KEEL_DB_", vars).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("main").unwrap().driver(), "sqlite");

        let broken = [("KEEL_DB_BAD".to_string(), "not a url".to_string())];
        assert!(ConfigurationRegistry::from_vars("KEEL_DB_", broken).is_err());
    }
}
