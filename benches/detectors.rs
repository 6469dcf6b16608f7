//! Benchmarks for fitting and scoring the anomaly models.

use anofox_anomaly::context::RunContext;
use anofox_anomaly::core::TimeSeries;
use anofox_anomaly::detection::{same_hour_zscore, SameHourConfig};
use anofox_anomaly::models::{AnomalyModel, KpiModel, ModelKind};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn generate_hourly(n: usize) -> TimeSeries {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let timestamps = (0..n).map(|i| base + Duration::hours(i as i64)).collect();
    let values = (0..n)
        .map(|i| {
            let t = i as f64;
            100.0
                + 30.0 * (2.0 * std::f64::consts::PI * t / 24.0).sin()
                + 10.0 * (2.0 * std::f64::consts::PI * t / 168.0).cos()
        })
        .collect();
    TimeSeries::new(timestamps, values).unwrap()
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    let ctx = RunContext::detached();

    for days in [14, 28].iter() {
        let series = generate_hourly(24 * days);
        for kind in [ModelKind::Additive, ModelKind::Hybrid, ModelKind::Decomposition] {
            group.bench_with_input(BenchmarkId::new(kind.as_str(), days), days, |b, _| {
                b.iter(|| {
                    let mut model = KpiModel::from_kind(kind);
                    model.fit(black_box(&series), &ctx).unwrap();
                    model
                })
            });
        }
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    let ctx = RunContext::detached();
    let history = generate_hourly(24 * 28);
    let train = history.slice(0, 24 * 21).unwrap();
    let batch = history.slice(24 * 21, 24 * 28).unwrap();

    for kind in [ModelKind::Additive, ModelKind::Hybrid, ModelKind::Decomposition] {
        let mut model = KpiModel::from_kind(kind);
        model.fit(&train, &ctx).unwrap();
        group.bench_function(kind.as_str(), |b| {
            b.iter(|| model.predict(black_box(&batch), &ctx).unwrap())
        });
    }

    group.finish();
}

fn bench_same_hour(c: &mut Criterion) {
    let series = generate_hourly(24 * 30);
    let config = SameHourConfig::default();
    c.bench_function("same_hour_zscore_30d", |b| {
        b.iter(|| same_hour_zscore(black_box(series.timestamps()), black_box(series.values()), &config))
    });
}

criterion_group!(benches, bench_fit, bench_predict, bench_same_hour);
criterion_main!(benches);
