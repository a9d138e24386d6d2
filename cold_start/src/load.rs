use std::{fmt::Display, time::Duration};

use log::{debug, info};
use rand::{rngs::ThreadRng, Rng};

use crate::{
    catalog::{AppDescriptor, Catalog},
    defaults,
    device::{CaptureMode, DeviceGateway},
    pause::Pause,
};

/// Amount of background activity present while the target app starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoadTier {
    Light,
    Medium,
    Heavy,
}

impl LoadTier {
    /// All tiers in the order the experiment visits them.
    pub const ALL: [LoadTier; 3] = [LoadTier::Light, LoadTier::Medium, LoadTier::Heavy];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadTier::Light => "light",
            LoadTier::Medium => "medium",
            LoadTier::Heavy => "heavy",
        }
    }
}

impl Display for LoadTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<cold_start_cli_types::LoadTier> for LoadTier {
    fn from(tier: cold_start_cli_types::LoadTier) -> Self {
        match tier {
            cold_start_cli_types::LoadTier::Light => LoadTier::Light,
            cold_start_cli_types::LoadTier::Medium => LoadTier::Medium,
            cold_start_cli_types::LoadTier::Heavy => LoadTier::Heavy,
        }
    }
}

/// Source of the random app picks of the light and heavy tiers.
pub trait Selector {
    /// Returns `min(amount, len)` distinct indices out of `0..len`.
    fn sample(&mut self, len: usize, amount: usize) -> Vec<usize>;
}

/// Uniform sampling without replacement.
#[derive(Debug)]
pub struct RandomSelector<R> {
    rng: R,
}

impl<R: Rng> RandomSelector<R> {
    pub fn new(rng: R) -> Self {
        RandomSelector { rng }
    }
}

impl RandomSelector<ThreadRng> {
    pub fn from_thread_rng() -> Self {
        RandomSelector::new(rand::rng())
    }
}

impl<R: Rng> Selector for RandomSelector<R> {
    fn sample(&mut self, len: usize, amount: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, len, amount.min(len)).into_vec()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSettings {
    pub light_count: usize,
    pub heavy_extra_count: usize,
    pub home_settle: Duration,
}

impl Default for LoadSettings {
    fn default() -> Self {
        LoadSettings {
            light_count: defaults::DEFAULT_LIGHT_COUNT,
            heavy_extra_count: defaults::DEFAULT_HEAVY_EXTRA_COUNT,
            home_settle: defaults::DEFAULT_HOME_SETTLE,
        }
    }
}

/// Puts a device under background load before the target app starts.
pub struct LoadGenerator<'c, S> {
    catalog: &'c Catalog,
    settings: LoadSettings,
    selector: S,
}

impl<'c, S: Selector> LoadGenerator<'c, S> {
    pub fn new(catalog: &'c Catalog, settings: LoadSettings, selector: S) -> Self {
        LoadGenerator {
            catalog,
            settings,
            selector,
        }
    }

    /// Apps to launch for `tier`, in launch order.
    ///
    /// Light picks a random subset of the moderate-footprint apps. Medium is
    /// every moderate-footprint app in catalog order. Heavy is Medium followed
    /// by random large-footprint apps whose package differs from
    /// `target_package`.
    pub fn select(&mut self, tier: LoadTier, target_package: Option<&str>) -> Vec<&'c AppDescriptor> {
        let catalog = self.catalog;
        let moderate = catalog.moderate();
        match tier {
            LoadTier::Light => self
                .selector
                .sample(moderate.len(), self.settings.light_count)
                .into_iter()
                .filter_map(|i| moderate.get(i))
                .collect(),
            LoadTier::Medium => moderate.iter().collect(),
            LoadTier::Heavy => {
                let others: Vec<&'c AppDescriptor> = catalog
                    .large()
                    .iter()
                    .filter(|app| Some(app.package.as_str()) != target_package)
                    .collect();
                let extra = self
                    .selector
                    .sample(others.len(), self.settings.heavy_extra_count)
                    .into_iter()
                    .filter_map(|i| others.get(i).copied());
                moderate.iter().chain(extra).collect()
            }
        }
    }

    /// Launches the apps of `tier` one after another, waiting `delay` after
    /// each, then returns to the home screen and waits for the device to
    /// settle.
    ///
    /// Returns the number of failed device commands. A failed launch does not
    /// stop the sequence.
    pub fn preload<G, P>(
        &mut self,
        gateway: &mut G,
        pause: &mut P,
        tier: LoadTier,
        target_package: Option<&str>,
        delay: Duration,
    ) -> usize
    where
        G: DeviceGateway + ?Sized,
        P: Pause + ?Sized,
    {
        let apps = self.select(tier, target_package);
        info!("Preloading [{tier}]: launching {} apps into the background", apps.len());

        let mut failures = 0;
        for app in apps {
            debug!("background launch of {app}");
            if gateway.launch(&app.component(), CaptureMode::Discard).is_err() {
                failures += 1;
            }
            pause.pause(delay);
        }

        if gateway.go_home().is_err() {
            failures += 1;
        }
        pause.pause(self.settings.home_settle);
        failures
    }
}
