// benches/benchmarks.rs — Performance benchmarks (criterion)
//
// Hot paths of a discovery run:
//   1. Pattern mining over weeks of event history
//   2. Similarity search in the relationship index
//   3. Synergy detection and deduplication
//   4. One full run against an in-memory store

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hearth::core::types::{DeviceRegistry, EntityInfo, Event, HomeType};
use hearth::index::{CorrelationVectorIndex, RelationshipFeatures, FEATURE_DIMENSION};
use hearth::infra::config::{PatternsConfig, SynergyConfig};
use hearth::patterns::PatternMiner;
use hearth::storage::MemoryStore;
use hearth::synergy::{deduplicate, SynergyDetector};
use hearth::{Config, DiscoveryInput, DiscoveryPipeline};

// ─── Helpers ────────────────────────────────────────────────────────────────

const AREAS: [&str; 6] = ["hall", "kitchen", "living_room", "bedroom", "office", "garage"];

/// A home with a motion sensor, a light and a cover per area, areas in a row.
fn build_registry() -> DeviceRegistry {
    let mut r = DeviceRegistry::new();
    for pair in AREAS.windows(2) {
        r.layout.connect(pair[0], pair[1]);
    }
    for area in AREAS {
        r.insert(EntityInfo::new(format!("binary_sensor.{area}_motion"), Some(area)));
        r.insert(EntityInfo::new(format!("light.{area}"), Some(area)));
        r.insert(EntityInfo::new(format!("cover.{area}"), Some(area)));
    }
    r
}

/// `days` of history: each area wakes at its own hour, motion then light then cover.
fn build_events(days: i64) -> Vec<Event> {
    let start = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
    let mut events = Vec::new();
    for day in 0..days {
        for (i, area) in AREAS.iter().enumerate() {
            let t = start + Duration::days(day) + Duration::hours(6 + 2 * i as i64);
            events.push(Event::new(t, &format!("binary_sensor.{area}_motion"), "on"));
            events.push(Event::new(t + Duration::seconds(4), &format!("light.{area}"), "on"));
            if day % 3 != 0 {
                events.push(Event::new(t + Duration::seconds(40), &format!("cover.{area}"), "open"));
            }
        }
    }
    events
}

fn build_index(n: usize) -> CorrelationVectorIndex {
    let mut index = CorrelationVectorIndex::new(FEATURE_DIMENSION);
    for i in 0..n {
        let v: Vec<f32> = (0..FEATURE_DIMENSION)
            .map(|d| ((i * 31 + d * 7) % 97) as f32 / 97.0)
            .collect();
        index
            .add(&format!("sensor.s{i}"), &format!("light.l{i}"), v)
            .expect("add");
    }
    index
}

// ─── Benchmark: Pattern mining ──────────────────────────────────────────────

fn bench_mining(c: &mut Criterion) {
    let config = PatternsConfig::default();
    let mut group = c.benchmark_group("mining");

    let month = build_events(30);
    group.bench_function("mine_30_days", |b| {
        b.iter(|| PatternMiner::new(&config).mine(black_box(&month)))
    });

    let quarter = build_events(90);
    group.bench_function("mine_90_days", |b| {
        b.iter(|| PatternMiner::new(&config).mine(black_box(&quarter)))
    });

    group.finish();
}

// ─── Benchmark: Index search ────────────────────────────────────────────────

fn bench_index(c: &mut Criterion) {
    let registry = build_registry();
    let query = RelationshipFeatures::from_registry(&registry, "binary_sensor.hall_motion", "light.hall")
        .with_lag(4.0)
        .with_hour(6.0)
        .encode();

    let mut group = c.benchmark_group("index");

    let small = build_index(1_000);
    group.bench_function("search_k5_1000", |b| {
        b.iter(|| small.search(black_box(&query), 5, None).expect("search"))
    });

    let large = build_index(5_000);
    group.bench_function("search_k5_5000", |b| {
        b.iter(|| large.search(black_box(&query), 5, None).expect("search"))
    });

    group.bench_function("search_k5_5000_bounded", |b| {
        b.iter(|| large.search(black_box(&query), 5, Some(0.5)).expect("search"))
    });

    group.bench_function("encode_features", |b| {
        b.iter(|| {
            RelationshipFeatures::from_registry(
                black_box(&registry),
                "binary_sensor.kitchen_motion",
                "cover.kitchen",
            )
            .with_lag(40.0)
            .encode()
        })
    });

    group.finish();
}

// ─── Benchmark: Synergy detection ───────────────────────────────────────────

fn bench_synergy(c: &mut Criterion) {
    let registry = build_registry();
    let patterns = PatternMiner::new(&PatternsConfig::default()).mine(&build_events(30));
    let detector = SynergyDetector::new(SynergyConfig::default());

    let mut group = c.benchmark_group("synergy");

    group.bench_function("detect_30_days", |b| {
        b.iter(|| detector.detect(black_box(&patterns), &registry, HomeType::SingleFamily, None))
    });

    let detected = detector.detect(&patterns, &registry, HomeType::SingleFamily, None);
    group.bench_function("dedup", |b| {
        b.iter(|| deduplicate(black_box(detected.clone())))
    });

    group.finish();
}

// ─── Benchmark: Full run ────────────────────────────────────────────────────

fn bench_run(c: &mut Criterion) {
    let registry = build_registry();
    let events = build_events(30);

    c.bench_function("pipeline_run_30_days", |b| {
        b.iter(|| {
            let mut pipeline = DiscoveryPipeline::new(Config::default()).expect("pipeline");
            let mut store = MemoryStore::new();
            pipeline
                .run(
                    DiscoveryInput {
                        events: black_box(&events),
                        registry: &registry,
                        home_type: "single_family",
                    },
                    &mut store,
                )
                .expect("run")
        })
    });
}

// ─── Main ───────────────────────────────────────────────────────────────────

criterion_group!(benches, bench_mining, bench_index, bench_synergy, bench_run);
criterion_main!(benches);
