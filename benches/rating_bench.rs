use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cx_race_ratings::ratings::{build_gap_sequence, score, RawGap, DEFAULT_IMPLAUSIBLE_THRESHOLD};
use cx_race_ratings::store::{merge_races, to_json_string, PersistedCollection};
use cx_race_ratings::RaceRecord;
use chrono::{Duration, NaiveDate};

fn sample_gaps() -> Vec<RawGap> {
    ["1:02:11", "+0:03", "s.t.", "+0:19", "0:19", "1:04", "DNF", "12", "+2:30", "3:01", "s.t.", "4:45", "5:00", "7:12"]
        .iter()
        .map(|g| RawGap::from(*g))
        .collect()
}

fn bench_rating(c: &mut Criterion) {
    let raw = sample_gaps();

    c.bench_function("build_gap_sequence", |b| {
        b.iter(|| black_box(build_gap_sequence(black_box(&raw), DEFAULT_IMPLAUSIBLE_THRESHOLD)))
    });

    let sequence = build_gap_sequence(&raw, DEFAULT_IMPLAUSIBLE_THRESHOLD).unwrap();
    c.bench_function("score", |b| b.iter(|| black_box(score(black_box(&sequence)))));
}

fn bench_merge(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2020, 9, 1).unwrap();
    let races: Vec<RaceRecord> = (0..500)
        .map(|i| RaceRecord {
            date: start + Duration::days(i / 2),
            venue: format!("Venue {}", i % 40),
            country: "BEL".to_string(),
            series: "Superprestige".to_string(),
            category: if i % 2 == 0 { "Elite Men" } else { "Elite Women" }.to_string(),
            rating: (i % 5 + 1) as u8,
        })
        .collect();
    let existing = PersistedCollection { last_updated: Some(start), races: races.clone() };
    let fresh: Vec<RaceRecord> = races.iter().take(50).cloned().collect();
    let today = start + Duration::days(400);

    c.bench_function("merge_500_with_50_fresh", |b| {
        b.iter(|| black_box(merge_races(existing.clone(), fresh.clone(), today)))
    });

    let merged = merge_races(existing.clone(), fresh.clone(), today);
    c.bench_function("serialize_500_races", |b| b.iter(|| black_box(to_json_string(&merged).unwrap())));
}

criterion_group!(benches, bench_rating, bench_merge);
criterion_main!(benches);
