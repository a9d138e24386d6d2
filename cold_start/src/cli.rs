use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};

use crate::catalog::Catalog;
use crate::config::{self, Settings};
use crate::device::{AdbGateway, DeviceError};
use crate::experiment::{Experiment, ExperimentSettings};
use crate::load::{LoadGenerator, LoadTier, RandomSelector};
use crate::logging;
use crate::pause::ThreadPause;
use crate::reporting::write_report;
use crate::stats::{aggregate_latencies, truncated_mean};
use crate::timer::StartupTimer;
use cold_start_cli_types::{Cli, Commands};

pub fn handle_calls() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log.as_deref()).with_context(|| {
        format!(
            "Failed to open log file {}",
            cli.log.as_deref().unwrap_or(Path::new("")).display()
        )
    })?;

    let mut settings = Settings::load()?;
    if let Some(serial) = cli.serial {
        settings.serial = Some(serial);
    }

    match cli.command {
        Commands::Run {
            rounds,
            output,
            timing,
            cache_drop_attempts,
            app,
            tier,
        } => {
            // Command line > config file > defaults
            if let Some(rounds) = rounds {
                settings.rounds = rounds;
            }
            if let Some(output) = output {
                settings.output = output;
            }
            if let Some(delay) = timing.delay {
                settings.delay = delay;
            }
            if let Some(attempts) = cache_drop_attempts {
                settings.cache_drop_attempts = attempts;
            }
            let tiers: Vec<LoadTier> = if tier.is_empty() {
                LoadTier::ALL.to_vec()
            } else {
                tier.into_iter().map(LoadTier::from).collect()
            };
            run(&settings, &app, &tiers)
        }
        Commands::Measure {
            repetitions,
            target,
        } => measure(&settings, &target, repetitions),
        Commands::Preload {
            tier,
            target,
            timing,
        } => {
            if let Some(delay) = timing.delay {
                settings.delay = delay;
            }
            preload(&settings, tier.into(), target.as_deref())
        }
        Commands::Clear {} => clear(&settings),
        Commands::Catalog {} => show_catalog(),
        Commands::Config {} => show_config_info(&settings),
    }
}

/// Opens the device. Fails if adb cannot be run at all, an unexpected
/// device state only warns.
fn connect(settings: &Settings) -> Result<AdbGateway> {
    let gateway = AdbGateway::new(&settings.adb, settings.serial.clone(), settings.home_timeout);
    match gateway.check_device() {
        Ok(()) => {}
        Err(e @ DeviceError::IoError(_)) => {
            return Err(e).with_context(|| format!("Could not run {}", settings.adb.display()))
        }
        Err(e) => warn!("Device check failed, continuing anyway: {e}"),
    }
    Ok(gateway)
}

fn run(settings: &Settings, app_filter: &[String], tiers: &[LoadTier]) -> Result<()> {
    let catalog = config::load_catalog()?;
    let targets = catalog.targets(app_filter)?;
    let gateway = connect(settings)?;

    info!(
        "Rounds: {}, inter-launch delay: {:?}, output: {}",
        settings.rounds,
        settings.delay,
        settings.output.display()
    );

    let mut experiment = Experiment::new(
        &catalog,
        ExperimentSettings::from(settings),
        LoadGenerator::new(
            &catalog,
            settings.load.clone(),
            RandomSelector::from_thread_rng(),
        ),
        StartupTimer::new(&settings.capture_file),
        gateway,
        ThreadPause,
    );
    let (records, summary) = experiment.run(&targets, tiers);

    match write_report(&settings.output, &records) {
        Ok(()) => info!("Results saved to {}", settings.output.display()),
        Err(e) => error!("Failed to save results to {}: {e}", settings.output.display()),
    }

    for line in summary.to_string().lines() {
        info!("{line}");
    }
    Ok(())
}

fn measure(settings: &Settings, target: &str, repetitions: u16) -> Result<()> {
    let catalog = config::load_catalog()?;
    let app = catalog.resolve(target)?;
    let mut gateway = connect(settings)?;
    let timer = StartupTimer::new(&settings.capture_file);

    let result = timer.measure_repeatedly(&mut gateway, &app, repetitions);
    if result.gateway_failures > 0 {
        warn!(
            "{} device commands failed while measuring",
            result.gateway_failures
        );
    }

    match (
        truncated_mean(result.latencies.iter().copied()),
        aggregate_latencies(result.latencies.iter().copied()),
    ) {
        (Some(mean), Some(stats)) => {
            info!("Mean startup time of {}: {mean} ms ({stats})", app.name())
        }
        _ => bail!("No startup time reported for {}", app),
    }
    Ok(())
}

fn preload(settings: &Settings, tier: LoadTier, target: Option<&str>) -> Result<()> {
    let catalog = config::load_catalog()?;
    let target_package = target.map(|query| match catalog.find(query) {
        Some(app) => app.package.clone(),
        None => query.to_owned(),
    });
    let mut gateway = connect(settings)?;

    let failures = LoadGenerator::new(
        &catalog,
        settings.load.clone(),
        RandomSelector::from_thread_rng(),
    )
    .preload(
        &mut gateway,
        &mut ThreadPause,
        tier,
        target_package.as_deref(),
        settings.delay,
    );
    if failures > 0 {
        warn!("{failures} device commands failed while preloading");
    }
    Ok(())
}

fn clear(settings: &Settings) -> Result<()> {
    let catalog = config::load_catalog()?;
    let gateway = connect(settings)?;
    let mut experiment = Experiment::new(
        &catalog,
        ExperimentSettings::from(settings),
        LoadGenerator::new(
            &catalog,
            settings.load.clone(),
            RandomSelector::from_thread_rng(),
        ),
        StartupTimer::new(&settings.capture_file),
        gateway,
        ThreadPause,
    );
    experiment.clear_background();
    if experiment.gateway_failures() > 0 {
        warn!(
            "{} device commands failed while clearing",
            experiment.gateway_failures()
        );
    }
    Ok(())
}

fn format_catalog(catalog: &Catalog) -> String {
    let section = |title: &str, apps: &[crate::catalog::AppDescriptor]| {
        let mut lines = vec![format!("{title} ({}):", apps.len())];
        lines.extend(
            apps.iter()
                .map(|app| format!("  {:<14}{}", app.name(), app.component())),
        );
        lines.join("\n")
    };
    format!(
        "{}\n\n{}",
        section("Large-footprint apps (targets)", catalog.large()),
        section("Moderate-footprint apps (background load)", catalog.moderate())
    )
}

fn show_catalog() -> Result<()> {
    let catalog = config::load_catalog()?;
    println!("{}", format_catalog(&catalog));
    Ok(())
}

fn describe_source(path: Option<PathBuf>) -> String {
    match path {
        Some(path) if path.is_file() => format!("{} (exists)", path.display()),
        Some(path) => format!("{} (not found)", path.display()),
        None => "(none)".to_string(),
    }
}

/// Show configuration sources and the effective settings
fn show_config_info(settings: &Settings) -> Result<()> {
    println!("cold-start configuration");
    println!("========================");
    println!("User config: {}", describe_source(config::system_config_path()));
    println!("Local config: {}", describe_source(config::find_config_path()));
    println!();
    println!("{settings}");
    Ok(())
}
