use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::Write,
    time::Duration,
};

use cold_start::{
    catalog::{AppDescriptor, Catalog},
    device::{CaptureMode, DeviceError, DeviceGateway},
    experiment::{Experiment, ExperimentSettings},
    load::{LoadGenerator, LoadSettings, LoadTier, RandomSelector},
    pause::Pause,
    reporting::write_report,
    timer::StartupTimer,
};
use rand::{rngs::StdRng, SeedableRng};
use tempfile::tempdir;

/// Device that reports a fixed startup time per launched component.
#[derive(Default)]
struct FakeDevice {
    startup_times: HashMap<String, u64>,
    running: Vec<String>,
    cache_drops: usize,
}

impl DeviceGateway for FakeDevice {
    fn launch(&mut self, component: &str, capture: CaptureMode<'_>) -> Result<(), DeviceError> {
        let package = component.split('/').next().unwrap_or_default().to_owned();
        self.running.push(package);
        if let (CaptureMode::AppendTo(path), Some(ms)) = (capture, self.startup_times.get(component))
        {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "Status: ok\nLaunchState: COLD\nTotalTime: {ms}\nComplete")?;
        }
        Ok(())
    }

    fn force_stop(&mut self, package: &str) -> Result<(), DeviceError> {
        self.running.retain(|running| running != package);
        Ok(())
    }

    fn go_home(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn drop_cache(&mut self) -> Result<(), DeviceError> {
        self.cache_drops += 1;
        Ok(())
    }
}

struct NoPause;

impl Pause for NoPause {
    fn pause(&mut self, _duration: Duration) {}
}

fn settings(rounds: u16) -> ExperimentSettings {
    ExperimentSettings {
        rounds,
        delay: Duration::from_secs(3),
        cache_drop_attempts: 3,
        cache_drop_settle: Duration::from_secs(2),
        extra_force_stop: vec!["com.android.chrome".to_string()],
    }
}

#[test]
fn single_round_report() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::default();
    let target = &catalog.large()[0];
    let mut device = FakeDevice::default();
    device.startup_times.insert(target.component(), 123);

    let mut experiment = Experiment::new(
        &catalog,
        settings(1),
        LoadGenerator::new(
            &catalog,
            LoadSettings::default(),
            RandomSelector::new(StdRng::seed_from_u64(1)),
        ),
        StartupTimer::new(dir.path().join("capture.log")),
        &mut device,
        NoPause,
    );
    let (records, summary) = experiment.run(&[target], &[LoadTier::Light]);
    assert_eq!(summary.recorded, 1);

    let output = dir.path().join("results.csv");
    write_report(&output, &records).unwrap();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "# raw_data\n\
         app_name\tload_type\tround_#\ttime(ms)\n\
         Booking\tlight\t1\t123\n\
         \n\
         # summary\n\
         app_name\tload_type\tavg_time(ms)\n\
         Booking\tlight\t123\n"
    );
    assert!(!dir.path().join("capture.log").exists());
    assert_eq!(device.cache_drops, 3);
    // Five background apps survive the round next to the target.
    assert_eq!(device.running.len(), 6);
    assert_eq!(device.running.last().map(String::as_str), Some("com.booking"));
}

#[test]
fn full_run_over_custom_catalog() {
    let dir = tempdir().unwrap();
    let app = |component: &str, name: &str| {
        AppDescriptor::from_component(component)
            .unwrap()
            .with_name(name)
    };
    let catalog = Catalog::new(
        (0..6)
            .map(|i| app(&format!("org.load{i}/.Main"), &format!("Load{i}")))
            .collect(),
        vec![
            app("org.alpha/.Main", "Alpha"),
            app("org.beta/.Main", "Beta"),
            app("org.gamma/.Main", "Gamma"),
        ],
    )
    .unwrap();

    let mut device = FakeDevice::default();
    device.startup_times.insert("org.alpha/.Main".to_string(), 300);
    device.startup_times.insert("org.beta/.Main".to_string(), 700);
    // Gamma never reports a startup time.

    let targets: Vec<&AppDescriptor> = catalog.large().iter().collect();
    let mut experiment = Experiment::new(
        &catalog,
        settings(3),
        LoadGenerator::new(
            &catalog,
            LoadSettings::default(),
            RandomSelector::new(StdRng::seed_from_u64(42)),
        ),
        StartupTimer::new(dir.path().join("capture.log")),
        &mut device,
        NoPause,
    );
    let (records, summary) = experiment.run(&targets, &LoadTier::ALL);

    assert_eq!(summary.targets, 3);
    assert_eq!(summary.attempted, 27);
    assert_eq!(summary.recorded, 18);
    assert_eq!(summary.skipped(), 9);
    assert!(records.iter().all(|r| r.app_name != "Gamma"));
    assert!(records
        .iter()
        .filter(|r| r.app_name == "Beta")
        .all(|r| r.latency_ms == Some(700)));

    let output = dir.path().join("results.tsv");
    write_report(&output, &records).unwrap();
    let report = fs::read_to_string(&output).unwrap();
    let summary_rows: Vec<&str> = report
        .split("# summary\n")
        .nth(1)
        .unwrap()
        .lines()
        .skip(1)
        .collect();
    assert_eq!(
        summary_rows,
        vec![
            "Alpha\tlight\t300",
            "Alpha\tmedium\t300",
            "Alpha\theavy\t300",
            "Beta\tlight\t700",
            "Beta\tmedium\t700",
            "Beta\theavy\t700",
        ]
    );
}

#[test]
fn xlsx_report_is_written() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::default();
    let target = &catalog.large()[2];
    let mut device = FakeDevice::default();
    device.startup_times.insert(target.component(), 950);

    let mut experiment = Experiment::new(
        &catalog,
        settings(2),
        LoadGenerator::new(
            &catalog,
            LoadSettings::default(),
            RandomSelector::new(StdRng::seed_from_u64(3)),
        ),
        StartupTimer::new(dir.path().join("capture.log")),
        &mut device,
        NoPause,
    );
    let (records, _) = experiment.run(&[target], &[LoadTier::Heavy]);
    assert_eq!(records.len(), 2);

    let output = dir.path().join("cold_start_results.xlsx");
    write_report(&output, &records).unwrap();
    assert!(fs::read(&output).unwrap().starts_with(b"PK"));
}
