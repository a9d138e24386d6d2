use std::{fmt::Display, time::Duration};

use chrono::{DateTime, Local};
use human_repr::HumanDuration;
use log::{debug, info, warn};

use crate::{
    catalog::{AppDescriptor, Catalog},
    config::Settings,
    data::TrialRecord,
    device::DeviceGateway,
    load::{LoadGenerator, LoadTier, Selector},
    pause::Pause,
    stats::{aggregate_latencies, truncated_mean},
    timer::StartupTimer,
};

/// Steps of a single round, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    ClearingBackground,
    Preloading,
    MeasuringTarget,
    RecordingResult,
}

impl RoundPhase {
    pub const ALL: [RoundPhase; 4] = [
        RoundPhase::ClearingBackground,
        RoundPhase::Preloading,
        RoundPhase::MeasuringTarget,
        RoundPhase::RecordingResult,
    ];
}

impl Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RoundPhase::ClearingBackground => "clearing background",
            RoundPhase::Preloading => "preloading",
            RoundPhase::MeasuringTarget => "measuring target",
            RoundPhase::RecordingResult => "recording result",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSettings {
    pub rounds: u16,
    /// Wait after each background launch
    pub delay: Duration,
    pub cache_drop_attempts: u32,
    pub cache_drop_settle: Duration,
    /// Force-stopped after the catalog apps, e.g. the system browser
    pub extra_force_stop: Vec<String>,
}

impl From<&Settings> for ExperimentSettings {
    fn from(settings: &Settings) -> Self {
        ExperimentSettings {
            rounds: settings.rounds,
            delay: settings.delay,
            cache_drop_attempts: settings.cache_drop_attempts,
            cache_drop_settle: settings.cache_drop_settle,
            extra_force_stop: settings.extra_force_stop.clone(),
        }
    }
}

/// Counters and timestamps of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub targets: usize,
    pub attempted: usize,
    pub recorded: usize,
    pub gateway_failures: usize,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
}

impl RunSummary {
    pub fn skipped(&self) -> usize {
        self.attempted - self.recorded
    }

    pub fn elapsed(&self) -> Duration {
        (self.finished - self.started).to_std().unwrap_or_default()
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Target apps: {}", self.targets)?;
        writeln!(
            f,
            "Rounds: {} recorded, {} skipped, {} attempted",
            self.recorded,
            self.skipped(),
            self.attempted
        )?;
        writeln!(f, "Failed device commands: {}", self.gateway_failures)?;
        writeln!(f, "Started: {}", self.started.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Finished: {}", self.finished.format("%Y-%m-%d %H:%M:%S"))?;
        write!(f, "Elapsed: {}", self.elapsed().as_secs_f64().human_duration())
    }
}

/// Cold-start experiment over a device.
///
/// Every round starts from a cleared device, puts it under the background load
/// of the round's tier and then measures the target. Device failures are
/// counted but never abort the run.
pub struct Experiment<'c, G, S, P> {
    catalog: &'c Catalog,
    settings: ExperimentSettings,
    load: LoadGenerator<'c, S>,
    timer: StartupTimer,
    gateway: G,
    pause: P,
    gateway_failures: usize,
}

impl<'c, G, S, P> Experiment<'c, G, S, P>
where
    G: DeviceGateway,
    S: Selector,
    P: Pause,
{
    pub fn new(
        catalog: &'c Catalog,
        settings: ExperimentSettings,
        load: LoadGenerator<'c, S>,
        timer: StartupTimer,
        gateway: G,
        pause: P,
    ) -> Self {
        Experiment {
            catalog,
            settings,
            load,
            timer,
            gateway,
            pause,
            gateway_failures: 0,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn pause(&self) -> &P {
        &self.pause
    }

    /// Failed device commands so far.
    pub fn gateway_failures(&self) -> usize {
        self.gateway_failures
    }

    /// Force-stops every catalog app (large-footprint first) and the extra
    /// packages, then drops the file-system cache repeatedly.
    pub fn clear_background(&mut self) {
        let catalog = self.catalog;
        debug!("force-stopping {} catalog apps", catalog.all_apps().count());
        let packages = catalog
            .all_apps()
            .map(|app| app.package.as_str())
            .chain(self.settings.extra_force_stop.iter().map(String::as_str));
        for package in packages {
            if self.gateway.force_stop(package).is_err() {
                self.gateway_failures += 1;
            }
        }

        for attempt in 1..=self.settings.cache_drop_attempts {
            self.pause.pause(self.settings.cache_drop_settle);
            debug!(
                "dropping caches ({attempt}/{})",
                self.settings.cache_drop_attempts
            );
            if self.gateway.drop_cache().is_err() {
                self.gateway_failures += 1;
            }
        }
    }

    /// Runs all phases of one round. Returns `None` when the target did not
    /// report a startup time.
    pub fn run_round(
        &mut self,
        target: &AppDescriptor,
        tier: LoadTier,
        round: u16,
    ) -> Option<TrialRecord> {
        let mut latency_ms = None;
        for phase in RoundPhase::ALL {
            debug!("{} [{tier}] round {round}: {phase}", target.name());
            match phase {
                RoundPhase::ClearingBackground => self.clear_background(),
                RoundPhase::Preloading => {
                    self.gateway_failures += self.load.preload(
                        &mut self.gateway,
                        &mut self.pause,
                        tier,
                        Some(&target.package),
                        self.settings.delay,
                    );
                }
                RoundPhase::MeasuringTarget => {
                    let launch = self.timer.measure(&mut self.gateway, target);
                    if launch.launch_failed {
                        self.gateway_failures += 1;
                    }
                    latency_ms = launch.latency_ms;
                }
                RoundPhase::RecordingResult => match latency_ms {
                    Some(ms) => info!("Startup time: {ms} ms"),
                    None => {
                        warn!("No startup time reported, skipping this round");
                        return None;
                    }
                },
            }
        }

        latency_ms.map(|latency_ms| TrialRecord {
            app_name: target.name().to_owned(),
            tier,
            round,
            latency_ms: Some(latency_ms),
        })
    }

    /// Measures each target under each tier for the configured number of
    /// rounds. Targets keep the given order, tiers always run light, medium,
    /// heavy.
    pub fn run(
        &mut self,
        targets: &[&AppDescriptor],
        tiers: &[LoadTier],
    ) -> (Vec<TrialRecord>, RunSummary) {
        let started = Local::now();
        let failures_before = self.gateway_failures;
        let rounds = self.settings.rounds;
        let tiers: Vec<LoadTier> = LoadTier::ALL
            .into_iter()
            .filter(|tier| tiers.contains(tier))
            .collect();

        info!(
            "Measuring {} apps under {} load tiers, {rounds} rounds each",
            targets.len(),
            tiers.len()
        );

        let mut records = Vec::new();
        let mut attempted = 0;
        for target in targets {
            info!("==== {target} ====");
            for &tier in &tiers {
                info!("-- load: {tier} --");
                let group_start = records.len();
                for round in 1..=rounds {
                    info!("Round {round}/{rounds}: {} [{tier}]", target.name());
                    attempted += 1;
                    if let Some(record) = self.run_round(target, tier, round) {
                        records.push(record);
                    }
                }
                log_group(target, tier, &records[group_start..]);
            }
        }

        let summary = RunSummary {
            targets: targets.len(),
            attempted,
            recorded: records.len(),
            gateway_failures: self.gateway_failures - failures_before,
            started,
            finished: Local::now(),
        };
        (records, summary)
    }
}

fn log_group(target: &AppDescriptor, tier: LoadTier, records: &[TrialRecord]) {
    let latencies = || records.iter().filter_map(|r| r.latency_ms);
    match (truncated_mean(latencies()), aggregate_latencies(latencies())) {
        (Some(mean), Some(stats)) => info!(
            "Mean startup time of {} [{tier}]: {mean} ms ({stats})",
            target.name()
        ),
        _ => warn!("No startup time recorded for {} [{tier}]", target.name()),
    }
}
