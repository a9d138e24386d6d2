use anyhow::{anyhow, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use fundu::DurationParser;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for rounds per app and load tier.
pub const MAX_ROUNDS: u16 = 10_000;

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadTier {
    /// A random handful of moderate-footprint apps
    Light,
    /// Every moderate-footprint app
    Medium,
    /// Every moderate-footprint app plus large-footprint apps other than the target
    Heavy,
}

#[derive(Parser)]
#[command(version, name = "cold-start")]
pub struct Cli {
    /// Increase verbosity level (can be specified multiple times.) The default level is "info",
    /// the first occurrence sets level "debug", and the second sets level "trace" for the logger.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Serial number of the device to drive. Passed on to `adb -s`.
    #[arg(short, long, global = true)]
    pub serial: Option<String>,

    /// Additionally write all log output to this file
    #[arg(short, long, global = true)]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Create a versionless command for manpage generation
    pub fn command_without_version() -> clap::Command {
        let mut cmd = Self::command();
        cmd = cmd.version(None::<&str>);
        cmd
    }
}

#[derive(Args)]
pub struct CliTiming {
    /// Wait between launching two background apps. Plain numbers are seconds,
    /// units such as "500ms" or "2s" are accepted.
    #[arg(short, long, value_parser=parse_delay)]
    pub delay: Option<Duration>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full cold-start experiment.
    ///
    /// For every large-footprint app of the catalog and every load tier, the
    /// device is cleared, the background load is started, and the app is
    /// launched while its reported `TotalTime` is captured. Rounds without a
    /// reported time are skipped. The raw values and per app/tier means are
    /// written to the output report.
    ///
    /// The report format is determined by the extension of the output file:
    /// `.xlsx` writes a workbook with the sheets `raw_data` and `summary`,
    /// `.csv`/`.tsv` write tab-separated sections, `-` writes those to stdout.
    Run {
        /// Rounds per app and load tier, at most 10000 to keep the raw data
        /// within the row limit of an xlsx worksheet
        #[arg(short = 'n', long, value_parser=clap::value_parser!(u16).range(1..=i64::from(MAX_ROUNDS)))]
        rounds: Option<u16>,

        /// Report output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        timing: CliTiming,

        /// How often the file-system cache is dropped while clearing the device
        #[arg(long, value_parser=clap::value_parser!(u32).range(1..))]
        cache_drop_attempts: Option<u32>,

        /// Restrict the targets to these apps (package or display name)
        #[arg(short, long, value_parser=parse_spaceless_string)]
        app: Vec<String>,

        /// Restrict the experiment to these load tiers
        #[arg(short, long)]
        tier: Vec<LoadTier>,
    },

    /// Measure the cold-start time of a single app without any background load
    Measure {
        /// Repetitions
        #[arg(short = 'n', long, value_parser=clap::value_parser!(u16).range(1..), default_value = "1")]
        repetitions: u16,

        /// App to launch: a catalog package or display name, or a `package/activity` component
        #[arg(value_parser=parse_spaceless_string)]
        target: String,
    },

    /// Start the background load of a tier and return to the home screen
    Preload {
        /// Load tier to generate
        tier: LoadTier,

        /// Package under test. Excluded from the large-footprint picks of the heavy tier.
        #[arg(short, long, value_parser=parse_spaceless_string)]
        target: Option<String>,

        #[command(flatten)]
        timing: CliTiming,
    },

    /// Force-stop all catalog apps and drop the file-system cache
    Clear {},

    /// List the apps of the effective catalog
    Catalog {},

    /// Show configuration sources and effective settings
    Config {},
}

fn parse_spaceless_string(s: &str) -> Result<String> {
    if s.split_whitespace().count() > 1 {
        Err(anyhow!("invalid string/key/value: found space in '{}'", s))
    } else {
        Ok(String::from(s))
    }
}

pub fn parse_delay(input: &str) -> Result<Duration> {
    let parser = DurationParser::with_all_time_units();
    let parsed = parser
        .parse(input.trim())
        .map_err(|e| anyhow!("invalid duration '{}': {}", input, e))?;
    Duration::try_from(parsed).map_err(|e| anyhow!("invalid duration '{}': {}", input, e))
}
