//! # CLI Integration Tests
//!
//! This module provides tests for the command-line interface, including
//! argument parsing, environment variables and command execution.

#[cfg(test)]
mod tests {
    use clap::Parser;
    use log::LevelFilter;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::cli::{execute, Cli, Commands, ConfigFormat, OutputFormat};
    use crate::input::{RunConfig, DATADIR_ENV};
    use crate::output::TableFormat;
    use crate::platform::Season;

    // Environment variable tests must not interleave
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_cli_help() {
        let result = Cli::try_parse_from(["cmg-backscatter", "--help"]);
        assert!(result.is_err()); // --help causes early exit with "error"

        let error = result.unwrap_err();
        assert!(error.to_string().contains("Monthly table over each platform's historical window"));
    }

    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["cmg-backscatter", "--version"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "cmg-backscatter",
            "--verbose",
            "--config",
            "/path/to/run.yaml",
            "template",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/run.yaml")));
        assert_eq!(cli.log_level(), LevelFilter::Debug);
        assert_eq!(cli.command_name(), "template");

        let quiet = Cli::parse_from(["cmg-backscatter", "template", "-q"]);
        assert_eq!(quiet.log_level(), LevelFilter::Error);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        let result = Cli::try_parse_from(["cmg-backscatter", "-v", "-q", "template"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_monthly_command_with_negative_longitude() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        let cli = Cli::parse_from([
            "cmg-backscatter",
            "monthly",
            "39.74",
            "-104.99",
            "Denver",
            "-d",
            "/archive",
            "--with-sass",
        ]);

        if let Commands::Monthly {
            location,
            datadir,
            with_sass,
            keep_nodata,
            format,
        } = &cli.command
        {
            assert_eq!(location.latitude, 39.74);
            assert_eq!(location.longitude, -104.99);
            assert_eq!(location.locname, "Denver");
            assert_eq!(datadir, &Some(PathBuf::from("/archive")));
            assert!(*with_sass);
            assert!(!*keep_nodata);
            assert_eq!(*format, TableFormat::Csv);
        } else {
            panic!("Expected Monthly command");
        }
    }

    #[test]
    fn test_negative_latitude() {
        let cli = Cli::parse_from([
            "cmg-backscatter",
            "plot",
            "-33.87",
            "151.21",
            "Sydney",
            "-s",
            "JFM",
        ]);
        if let Commands::Plot { location, season, .. } = &cli.command {
            assert_eq!(location.latitude, -33.87);
            assert_eq!(*season, Season::Jfm);
        } else {
            panic!("Expected Plot command");
        }
    }

    #[test]
    fn test_seasonal_command_defaults() {
        let cli = Cli::parse_from(["cmg-backscatter", "seasonal", "51.5", "-0.12", "London"]);
        if let Commands::Seasonal {
            season,
            urban,
            format,
            ..
        } = &cli.command
        {
            assert_eq!(*season, Season::Jas);
            assert!(!*urban);
            assert_eq!(*format, TableFormat::Csv);
        } else {
            panic!("Expected Seasonal command");
        }
    }

    #[test]
    fn test_seasonal_command_options() {
        let cli = Cli::parse_from([
            "cmg-backscatter",
            "seasonal",
            "51.5",
            "-0.12",
            "London",
            "--season",
            "ond",
            "--urban",
            "--keep-nodata",
            "--format",
            "parquet",
        ]);
        if let Commands::Seasonal {
            season,
            urban,
            keep_nodata,
            format,
            ..
        } = &cli.command
        {
            assert_eq!(*season, Season::Ond);
            assert!(*urban);
            assert!(*keep_nodata);
            assert_eq!(*format, TableFormat::Parquet);
        } else {
            panic!("Expected Seasonal command");
        }
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        // Unknown season
        let season = ["cmg-backscatter", "seasonal", "1", "2", "X", "-s", "DJF"];
        assert!(Cli::try_parse_from(season).is_err());
        // Non-numeric latitude
        assert!(Cli::try_parse_from(["cmg-backscatter", "monthly", "north", "2", "X"]).is_err());
        // Missing location name
        assert!(Cli::try_parse_from(["cmg-backscatter", "plot", "1", "2"]).is_err());
        // Unknown table format
        let format = ["cmg-backscatter", "monthly", "1", "2", "X", "--format", "xlsx"];
        assert!(Cli::try_parse_from(format).is_err());
    }

    #[test]
    fn test_inventory_and_template_commands() {
        let cli = Cli::parse_from(["cmg-backscatter", "inventory", "--format", "yaml"]);
        if let Commands::Inventory { format, .. } = &cli.command {
            assert_eq!(*format, OutputFormat::Yaml);
        } else {
            panic!("Expected Inventory command");
        }

        let cli = Cli::parse_from([
            "cmg-backscatter",
            "template",
            "--format",
            "yaml",
            "-o",
            "run.yaml",
        ]);
        if let Commands::Template { output, format } = &cli.command {
            assert_eq!(output, &Some(PathBuf::from("run.yaml")));
            assert_eq!(*format, ConfigFormat::Yaml);
        } else {
            panic!("Expected Template command");
        }
    }

    #[test]
    fn test_datadir_from_environment() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        let original = std::env::var(DATADIR_ENV).ok();

        unsafe {
            std::env::set_var(DATADIR_ENV, "/from/env");
        }
        let cli = Cli::parse_from(["cmg-backscatter", "seasonal", "1", "2", "X"]);
        let from_env = match &cli.command {
            Commands::Seasonal { datadir, .. } => datadir.clone(),
            _ => None,
        };

        // The flag still wins over the environment
        let cli =
            Cli::parse_from(["cmg-backscatter", "seasonal", "1", "2", "X", "-d", "/from/flag"]);
        let from_flag = match &cli.command {
            Commands::Seasonal { datadir, .. } => datadir.clone(),
            _ => None,
        };

        unsafe {
            match original {
                Some(ref val) => std::env::set_var(DATADIR_ENV, val),
                None => std::env::remove_var(DATADIR_ENV),
            }
        }

        assert_eq!(from_env, Some(PathBuf::from("/from/env")));
        assert_eq!(from_flag, Some(PathBuf::from("/from/flag")));
    }

    #[test]
    fn test_template_command_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        for (format, name) in [("json", "run.json"), ("yaml", "run.yaml")] {
            let path = dir.path().join(name);
            let cli = Cli::parse_from([
                "cmg-backscatter",
                "template",
                "--format",
                format,
                "-o",
                path.to_str().unwrap(),
            ]);
            execute(&cli).unwrap();

            let config = RunConfig::from_file(&path).unwrap();
            assert_eq!(config, RunConfig::template());
        }
    }

    #[test]
    fn test_completions_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmg-backscatter.bash");
        let cli = Cli::parse_from([
            "cmg-backscatter",
            "completions",
            "bash",
            "-o",
            path.to_str().unwrap(),
        ]);
        execute(&cli).unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.contains("cmg-backscatter"));
        assert!(script.contains("seasonal"));
    }

    #[test]
    fn test_bad_config_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ \"grid\": 3 }").unwrap();

        let cli = Cli::parse_from([
            "cmg-backscatter",
            "--config",
            path.to_str().unwrap(),
            "inventory",
            "-d",
            dir.path().to_str().unwrap(),
        ]);
        let err = execute(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }

    #[test]
    fn test_inventory_command_on_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "cmg-backscatter",
            "inventory",
            "-d",
            dir.path().to_str().unwrap(),
            "--format",
            "csv",
        ]);
        execute(&cli).unwrap();
    }
}
