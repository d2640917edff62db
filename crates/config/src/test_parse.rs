#[cfg(test)]
mod tests {
    use std::{collections::HashMap, env, fs, path::Path, process};

    use chargewire_protocol::EventKind;

    use crate::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let cfg = load_from_str("()", None).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.ws_url, DEFAULT_WS_URL);
        assert_eq!(cfg.reconnect.strategy, BackoffStrategy::Exponential);
        assert_eq!(cfg.reconnect.base_interval_ms, 1000);
        assert_eq!(cfg.reconnect.ceiling_ms, 30_000);
        assert_eq!(cfg.reconnect.max_attempts, 10);
        assert_eq!(cfg.feed_capacity, 100);
        cfg.validate().unwrap();
    }

    #[test]
    fn full_config_parses() {
        let ron = r#"(
            ws_url: "wss://ops.example.com/api/v1/notifications/ws",
            reconnect: (strategy: fixed, base_interval_ms: 5000, ceiling_ms: 5000, max_attempts: 3),
            feed_capacity: 20,
            subscription: (station_id: Some("CP1"), kinds: ["TransactionStarted", "transaction_stopped"]),
        )"#;
        let cfg = load_from_str(ron, None).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.reconnect.strategy, BackoffStrategy::Fixed);
        assert_eq!(cfg.reconnect.max_attempts, 3);
        assert_eq!(cfg.feed_capacity, 20);
        assert_eq!(cfg.subscription.station_id.as_deref(), Some("CP1"));
        assert_eq!(
            cfg.subscription.kinds,
            [EventKind::TransactionStarted, EventKind::TransactionStopped]
        );
    }

    #[test]
    fn unknown_field_fails() {
        let err = load_from_str("(feed_capacty: 5)", None).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("feed_capacty"));
    }

    #[test]
    fn partial_reconnect_keeps_other_defaults() {
        let cfg = load_from_str("(reconnect: (max_attempts: 2))", None).unwrap();
        assert_eq!(cfg.reconnect.max_attempts, 2);
        assert_eq!(cfg.reconnect.base_interval_ms, DEFAULT_BASE_INTERVAL_MS);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = Config {
            ws_url: "http://localhost:8080/ws".into(),
            ..Config::default()
        };
        assert!(cfg.validate().unwrap_err().to_string().starts_with("ws_url"));

        cfg.ws_url = "not a url".into();
        assert!(cfg.validate().is_err());

        cfg = Config::default();
        cfg.reconnect.base_interval_ms = 0;
        assert!(
            cfg.validate()
                .unwrap_err()
                .to_string()
                .starts_with("reconnect.base_interval_ms")
        );

        cfg = Config::default();
        cfg.reconnect.ceiling_ms = 500;
        assert!(
            cfg.validate()
                .unwrap_err()
                .to_string()
                .starts_with("reconnect.ceiling_ms")
        );

        cfg = Config::default();
        cfg.feed_capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overlay_overrides_file_values() {
        let mut cfg = Config::default();
        apply_env(
            &mut cfg,
            env_of(&[
                (ENV_WS_URL, "wss://other.test/ws"),
                (ENV_RECONNECT_INTERVAL_MS, " 2500 "),
                (ENV_RECONNECT_MAX_ATTEMPTS, "4"),
                (ENV_RECONNECT_STRATEGY, "Fixed"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.ws_url, "wss://other.test/ws");
        assert_eq!(cfg.reconnect.base_interval_ms, 2500);
        assert_eq!(cfg.reconnect.max_attempts, 4);
        assert_eq!(cfg.reconnect.strategy, BackoffStrategy::Fixed);
        assert_eq!(cfg.reconnect.ceiling_ms, DEFAULT_CEILING_MS);
    }

    #[test]
    fn fixed_interval_above_default_ceiling_is_valid() {
        let mut cfg = Config::default();
        apply_env(
            &mut cfg,
            env_of(&[
                (ENV_RECONNECT_STRATEGY, "fixed"),
                (ENV_RECONNECT_INTERVAL_MS, "60000"),
            ]),
        )
        .unwrap();
        cfg.validate().unwrap();

        cfg.reconnect.strategy = BackoffStrategy::Exponential;
        assert!(
            cfg.validate()
                .unwrap_err()
                .to_string()
                .starts_with("reconnect.ceiling_ms")
        );
    }

    #[test]
    fn env_overlay_rejects_garbage() {
        let mut cfg = Config::default();
        let err = apply_env(&mut cfg, env_of(&[(ENV_RECONNECT_MAX_ATTEMPTS, "many")])).unwrap_err();
        assert!(err.pretty().contains(ENV_RECONNECT_MAX_ATTEMPTS));

        let err = apply_env(&mut cfg, env_of(&[(ENV_RECONNECT_STRATEGY, "linear")])).unwrap_err();
        assert!(err.to_string().contains("linear"));
    }

    #[test]
    fn file_errors_carry_the_path() {
        let dir = env::temp_dir().join(format!("chargewire-config-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.ron");
        let err = load_from_path(&missing).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert_eq!(err.path(), Some(missing.as_path()));

        let bad = dir.join("bad.ron");
        fs::write(&bad, "(feed_capacity: 0)").unwrap();
        let err = load_from_path(&bad).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.path(), Some(bad.as_path()));
        assert!(err.pretty().contains("bad.ron"));

        let good = dir.join("good.ron");
        fs::write(&good, "(feed_capacity: 7)").unwrap();
        assert_eq!(load_from_path(&good).unwrap().feed_capacity, 7);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn explicit_path_wins() {
        let p = Path::new("/nonexistent/chargewire.ron");
        assert_eq!(resolve_config_path(Some(p)).as_deref(), Some(p));
        assert!(default_config_path().ends_with(".chargewire/config.ron"));
    }
}
