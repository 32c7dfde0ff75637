use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mailgraph_core::temporal::default_domain_start;
use mailgraph_core::{
    CoFilterEngine, Dataset, DateRange, Entity, EntityKind, EntityStatsIndex, RecordingChart,
    RecordingRenderer, Relation, RenderConfig, RenderFeed, TemporalAggregator,
};

const ENTITIES: usize = 2_000;
const RELATIONS: usize = 40_000;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap()
}

/// Deterministic synthetic mailbox: a few busy senders, many quiet ones,
/// spread over roughly three years.
fn synthetic() -> (Vec<Entity>, Vec<Relation>) {
    let entities = (0..ENTITIES)
        .map(|i| {
            let kind = if i % 5 == 0 {
                EntityKind::ExternalAddress
            } else {
                EntityKind::EnronAddress
            };
            Entity::new(format!("{i}"), format!("user{i}@example.com"), kind)
        })
        .collect();

    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let relations = (0..RELATIONS)
        .map(|i| {
            let from = (next() % 100) as usize * (next() % 20) as usize % ENTITIES;
            let to = (next() % ENTITIES as u64) as usize;
            let minutes = (next() % (3 * 365 * 24 * 60)) as i64;
            Relation::new(
                format!("msg{i}"),
                format!("{from}"),
                format!("{to}"),
                Some(start() + Duration::minutes(minutes)),
            )
        })
        .collect();
    (entities, relations)
}

fn bench_aggregation(c: &mut Criterion) {
    let (entities, relations) = synthetic();

    c.bench_function("stats_compute_40k", |b| {
        b.iter(|| EntityStatsIndex::compute(black_box(&entities), black_box(&relations)))
    });

    let aggregator = TemporalAggregator::new(default_domain_start());
    c.bench_function("bucket_build_40k", |b| {
        b.iter(|| aggregator.build(black_box(&relations)))
    });
}

fn bench_filtering(c: &mut Criterion) {
    let (entities, relations) = synthetic();
    let (dataset, _) = Dataset::from_parts(entities, relations);
    let mut engine = CoFilterEngine::new(dataset, default_domain_start()).unwrap();

    c.bench_function("degree_recompute", |b| {
        let mut threshold = 0;
        b.iter(|| {
            threshold = (threshold + 1) % 30;
            engine.set_degree_threshold(black_box(threshold));
        })
    });

    let quarter = DateRange::new(start(), start() + Duration::days(90));
    let year = DateRange::new(start(), start() + Duration::days(365));
    c.bench_function("date_recompute_quarter", |b| {
        b.iter(|| engine.set_date_range(black_box(Some(quarter))))
    });
    c.bench_function("date_recompute_year", |b| {
        b.iter(|| engine.set_date_range(black_box(Some(year))))
    });

    engine.set_degree_threshold(2);
    c.bench_function("visible_relations", |b| {
        b.iter(|| black_box(engine.visible_relations()))
    });
}

fn bench_feed(c: &mut Criterion) {
    let (entities, relations) = synthetic();
    let (dataset, _) = Dataset::from_parts(entities, relations);
    let engine = CoFilterEngine::new(dataset, default_domain_start()).unwrap();
    let mut feed = RenderFeed::new(
        engine,
        RecordingRenderer::new(),
        RecordingChart::new(),
        RenderConfig::default(),
    );
    feed.initialize();

    c.bench_function("feed_degree_toggle", |b| {
        let mut high = false;
        b.iter(|| {
            high = !high;
            feed.on_degree_change(black_box(if high { 10 } else { 0 }))
        })
    });
}

criterion_group!(benches, bench_aggregation, bench_filtering, bench_feed);
criterion_main!(benches);
