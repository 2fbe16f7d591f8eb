//! Benchmarks for store merges and classification

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;
use signal_desk::classify::{classify, ClassifierConfig};
use signal_desk::signal::{Decision, DecisionState, Direction, Signal};
use signal_desk::store::BoundedStore;

fn signals(count: usize, distinct_keys: usize) -> Vec<Signal> {
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let mut s = Signal::new(
                format!("sig-{}", i),
                "EURUSD",
                if i % 2 == 0 { Direction::Buy } else { Direction::Sell },
                base + Duration::seconds(i as i64),
            );
            s.merge_key = format!("key-{}", i % distinct_keys);
            s.decision = Decision {
                state: match i % 3 {
                    0 => DecisionState::Enter,
                    1 => DecisionState::WaitMonitor,
                    _ => DecisionState::Skip,
                },
                blocked: false,
            };
            s.is_valid = i % 4 != 0;
            s.confidence = Some((i % 100) as f64);
            s.strength = Some(((i * 7) % 100) as f64);
            s.entry_price = Some(dec!(1.1));
            s.stop_loss = Some(dec!(1.09));
            s.take_profit = Some(dec!(1.12));
            s
        })
        .collect()
}

fn benchmark_merge_into_full_store(c: &mut Criterion) {
    let mut store = BoundedStore::new(200);
    store.merge(signals(200, 200));
    let batch = signals(50, 120);

    c.bench_function("merge_50_into_200", |b| {
        b.iter(|| {
            let mut s = store.clone();
            s.merge(black_box(batch.clone()))
        })
    });
}

fn benchmark_classify(c: &mut Criterion) {
    let pool = signals(200, 200);
    let config = ClassifierConfig::default();

    c.bench_function("classify_200", |b| {
        b.iter(|| classify(black_box(&pool), &[], &config))
    });
}

criterion_group!(benches, benchmark_merge_into_full_store, benchmark_classify);
criterion_main!(benches);
