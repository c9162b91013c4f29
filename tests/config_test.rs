use std::env;
use std::fs;
use tempfile::tempdir;

#[cfg(test)]
mod config_tests {
    use super::*;
    use client_counts::analyzer::ReportSettings;
    use client_counts::config::Config;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.logging.level, "WARN");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "console");

        assert_eq!(config.report.top_limit, 10);
        assert_eq!(config.report.default_report_months, 12);
        assert_eq!(config.report.counts_floor, None);

        assert!(!config.output.json_pretty);
        assert_eq!(config.output.timestamp_format, "%Y-%m-%d");
    }

    // Env vars are process-wide, so overrides and the invalid case share one test.
    #[test]
    fn test_env_variable_override() {
        env::set_var("CLIENT_COUNTS_REPORT_MONTHS", "24");
        env::set_var("CLIENT_COUNTS_FLOOR", "2023-04");

        let mut config = Config::default();
        config
            .apply_env_overrides()
            .expect("Failed to apply env overrides");

        assert_eq!(config.report.default_report_months, 24);
        assert_eq!(config.report.counts_floor.as_deref(), Some("2023-04"));
        assert!(config.validate().is_ok());

        env::set_var("CLIENT_COUNTS_TOP_LIMIT", "many");
        let mut config = Config::default();
        assert!(config.apply_env_overrides().is_err());

        env::remove_var("CLIENT_COUNTS_TOP_LIMIT");
        env::remove_var("CLIENT_COUNTS_REPORT_MONTHS");
        env::remove_var("CLIENT_COUNTS_FLOOR");
    }

    #[cfg(feature = "basic")]
    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client-counts.toml");
        fs::write(
            &path,
            r#"
[logging]
level = "DEBUG"
format = "json"
output = "console"

[report]
top_limit = 5
counts_floor = "2023-07-01T00:00:00Z"
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.report.top_limit, 5);
        assert_eq!(config.report.default_report_months, 12);

        let settings = ReportSettings::from_config(&config);
        assert_eq!(settings.top_limit, 5);
        assert_eq!(
            settings.counts_floor.map(|f| f.to_rfc3339()),
            Some("2023-07-01T00:00:00+00:00".to_string())
        );
    }

    #[cfg(feature = "basic")]
    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = Config::default();
        config.report.top_limit = 7;
        config.save_to_file(&path).unwrap();

        let reloaded = Config::load_from_file(&path).unwrap();
        assert_eq!(reloaded.report.top_limit, 7);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[report\ntop_limit = ").unwrap();

        #[cfg(feature = "basic")]
        assert!(Config::load_from_file(&path).is_err());
    }
}
