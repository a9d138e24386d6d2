use cold_start::data::TrialRecord;
use cold_start::load::LoadTier;
use cold_start::reporting::{build_tables, summarize};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

/// Records of a full run: `apps` targets, all tiers, `rounds` rounds each.
fn run_records(apps: usize, rounds: u16) -> Vec<TrialRecord> {
    let mut records = Vec::new();
    for app in 0..apps {
        for tier in LoadTier::ALL {
            for round in 1..=rounds {
                records.push(TrialRecord {
                    app_name: format!("App{app}"),
                    tier,
                    round,
                    latency_ms: Some(400 + (app as u64 * 37 + u64::from(round) * 11) % 900),
                });
            }
        }
    }
    records
}

fn report_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_tables");
    for rounds in [1u16, 10, 100].into_iter() {
        let records = run_records(13, rounds);
        group.bench_with_input(BenchmarkId::new("summarize", rounds), &records, |b, r| {
            b.iter(|| summarize(r));
        });
        group.bench_with_input(BenchmarkId::new("build_tables", rounds), &records, |b, r| {
            b.iter(|| build_tables(r));
        });
    }

    group.finish();
}

criterion_group!(benches, report_tables);
criterion_main!(benches);
