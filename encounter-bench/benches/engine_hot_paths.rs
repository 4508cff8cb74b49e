//! Encounter engine benchmark suite.
//!
//! Per-tick hot paths, sized for a busy region:
//!   damage_record_single .............. < 2μs
//!   threat_assess_500_hits_40_contacts  < 100μs
//!   velocity_plan_single .............. < 1μs
//!   optimal_range_8_weapons ........... < 1μs

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use chrono::{DateTime, Duration, Utc};
use glam::DVec3;

use encounter_core::damage::{DamageEntry, DamageLedger};
use encounter_core::movement::{self, MovementTuning, VelocityInput};
use encounter_core::targeting;
use encounter_core::types::{ConstructId, PlayerId, RadarContact};
use encounter_core::weapons::{self, WeaponDefinition};

fn clock() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

fn make_hit(i: u64, now: DateTime<Utc>) -> DamageEntry {
    DamageEntry {
        source_construct_id: ConstructId(i % 12),
        player_id: PlayerId(i % 30),
        damage: 10.0 + (i % 7) as f64,
        timestamp: now - Duration::seconds((i % 90) as i64),
    }
}

fn make_contacts(n: u64) -> Vec<RadarContact> {
    (0..n)
        .map(|i| {
            let d = 1_000.0 + i as f64 * 750.0;
            RadarContact::new(ConstructId(100 + i), DVec3::new(d, 0.0, 0.0), d)
        })
        .collect()
}

fn bench_damage_record(c: &mut Criterion) {
    let now = clock();
    let seeded = || {
        let ledger = DamageLedger::new();
        for i in 0..200 {
            ledger.record_damage_at(make_hit(i, now), now);
        }
        ledger
    };
    // Fresh ledger per batch; the history would otherwise grow without bound.
    c.bench_function("damage_record_single", |b| {
        b.iter_batched(
            seeded,
            |ledger| ledger.record_damage_at(black_box(make_hit(7, now)), now),
            BatchSize::SmallInput,
        );
    });
}

fn bench_threat_assessment(c: &mut Criterion) {
    let now = clock();
    let hits: Vec<DamageEntry> = (0..500).map(|i| make_hit(i, now)).collect();
    let contacts = make_contacts(40);
    c.bench_function("threat_rank_500_hits", |b| {
        b.iter(|| black_box(targeting::rank_threats(black_box(&hits))));
    });
    c.bench_function("threat_assess_500_hits_40_contacts", |b| {
        b.iter(|| black_box(targeting::assess_threat(black_box(&hits), black_box(&contacts))));
    });
    c.bench_function("threat_assess_radar_fallback_40_contacts", |b| {
        b.iter(|| black_box(targeting::assess_threat(&[], black_box(&contacts))));
    });
}

fn bench_velocity_plan(c: &mut Criterion) {
    let tuning = MovementTuning::default();
    let input = VelocityInput {
        target_distance: 12_500.0,
        optimal_range: 8_000.0,
        target_speed: 320.0,
        velocity_dot: -0.4,
        braking_distance: 3_000.0,
    };
    c.bench_function("velocity_plan_single", |b| {
        b.iter(|| black_box(movement::plan_velocity(&tuning, black_box(&input))));
    });
}

fn bench_optimal_range(c: &mut Criterion) {
    let loadout: Vec<WeaponDefinition> = (0..8)
        .map(|i| {
            let base = 1_000.0 * f64::from(i + 1);
            WeaponDefinition::new(format!("weapon-{i}"), base, base * 0.5)
        })
        .collect();
    c.bench_function("optimal_range_8_weapons", |b| {
        b.iter(|| black_box(weapons::optimal_range(&loadout, black_box(6_400.0))));
    });
}

criterion_group!(
    benches,
    bench_damage_record,
    bench_threat_assessment,
    bench_velocity_plan,
    bench_optimal_range,
);
criterion_main!(benches);
