#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the batch geocoder.
//!
//! Reads an address table, resolves each row against the Google Geocoding
//! API and writes the table back out with coordinate columns appended.

use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use geobatch_cli_utils::IndicatifProgress;
use geobatch_geocoder::google::GoogleGeocoder;
use geobatch_geocoder::resolver::AddressResolver;
use geobatch_pipeline::config::BatchConfig;

#[derive(Parser)]
#[command(name = "geobatch", about = "Batch address geocoder")]
struct Cli {
    /// Delimited address table to read
    #[arg(default_value = "./tbl1_500.csv")]
    input: PathBuf,
    /// Where to write the augmented table (truncated if it exists)
    #[arg(default_value = "./updated_tbl1_500.csv")]
    output: PathBuf,
    /// TOML file overriding the built-in column and service settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Maximum number of rows to process (for testing)
    #[arg(long)]
    limit: Option<u64>,
    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

/// Everything a run needs, opened in startup order.
struct Startup {
    config: BatchConfig,
    resolver: AddressResolver<GoogleGeocoder>,
    input: File,
    output: File,
}

/// Resolves the credential through `lookup` and builds the client before
/// either file is touched, so a missing key never reads the input or
/// truncates the output.
fn prepare(
    cli: &Cli,
    config: BatchConfig,
    lookup: impl FnOnce(&str) -> Option<String>,
) -> Result<Startup, Box<dyn std::error::Error>> {
    let api_key = config.api_key_from(lookup)?;
    let geocoder = GoogleGeocoder::new(config.google_config(api_key))?;
    let resolver = AddressResolver::new(geocoder, config.retry_policy());

    let input = File::open(&cli.input)
        .map_err(|e| format!("Failed to open {}: {e}", cli.input.display()))?;
    let output = File::create(&cli.output)
        .map_err(|e| format!("Failed to create {}: {e}", cli.output.display()))?;

    Ok(Startup {
        config,
        resolver,
        input,
        output,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = geobatch_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = BatchConfig::load(cli.config.as_deref())?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let Startup {
        config,
        resolver,
        input,
        output,
    } = prepare(&cli, config, |var| std::env::var(var).ok())?;

    log::info!(
        "Geocoding {} into {}",
        cli.input.display(),
        cli.output.display()
    );

    let start = Instant::now();
    let progress = IndicatifProgress::rows_bar(&multi, "Geocoding");
    let summary =
        geobatch_pipeline::run(&config, &resolver, input, output, &progress, cli.limit).await?;

    log::info!(
        "Done in {:.1}s: {} rows, {} resolved, {} failed, {} skipped, {} unwritten",
        start.elapsed().as_secs_f64(),
        summary.rows,
        summary.resolved,
        summary.failed,
        summary.skipped,
        summary.unwritten
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use clap::CommandFactory;
    use geobatch_pipeline::config::ConfigError;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn paths_default_to_working_directory_files() {
        let cli = Cli::try_parse_from(["geobatch"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("./tbl1_500.csv"));
        assert_eq!(cli.output, PathBuf::from("./updated_tbl1_500.csv"));
        assert!(cli.config.is_none());
        assert!(!cli.print_config);
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("geobatch-{}-{name}", std::process::id()))
    }

    #[test]
    fn missing_credential_fails_before_files_are_touched() {
        let output = scratch_path("no-key-out.csv");
        let cli = Cli::try_parse_from([
            OsStr::new("geobatch"),
            scratch_path("does-not-exist.csv").as_os_str(),
            output.as_os_str(),
        ])
        .unwrap();

        let err = prepare(&cli, BatchConfig::embedded().unwrap(), |_| None)
            .err()
            .unwrap();

        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCredential { var }) if var == "GOOGLE_API_KEY"
        ));
        assert!(!output.exists());
    }

    #[test]
    fn missing_input_is_reported_before_output_is_created() {
        let output = scratch_path("no-input-out.csv");
        let cli = Cli::try_parse_from([
            OsStr::new("geobatch"),
            scratch_path("also-missing.csv").as_os_str(),
            output.as_os_str(),
        ])
        .unwrap();

        let err = prepare(&cli, BatchConfig::embedded().unwrap(), |_| {
            Some("test-key".to_string())
        })
        .err()
        .unwrap();

        assert!(err.to_string().starts_with("Failed to open"));
        assert!(!output.exists());
    }

    #[test]
    fn parses_paths_and_flags() {
        let cli = Cli::try_parse_from([
            "geobatch",
            "in.csv",
            "out.csv",
            "--config",
            "batch.toml",
            "--limit",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.input, PathBuf::from("in.csv"));
        assert_eq!(cli.output, PathBuf::from("out.csv"));
        assert_eq!(cli.config, Some(PathBuf::from("batch.toml")));
        assert_eq!(cli.limit, Some(10));
    }
}
