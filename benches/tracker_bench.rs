//! Benchmarks for DevChain hot paths
//!
//! Run with: cargo bench

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use devchain::badges;
use devchain::model::{Category, Entry, NewEntry};
use devchain::rate_limit::SlidingWindowLimiter;
use devchain::storage::{BadgeClaim, MemoryStore, Repository, SqliteStore};
use devchain::validation;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn new_entry(i: usize) -> NewEntry {
    NewEntry {
        title: format!("Entry number {}", i),
        description: "Worked through another chapter of the book".to_string(),
        category: Category::Book,
        date: Utc::now().date_naive(),
    }
}

fn bench_badges(c: &mut Criterion) {
    let mut group = c.benchmark_group("badges");

    let claims: Vec<BadgeClaim> = [1, 5, 10]
        .into_iter()
        .map(|milestone| BadgeClaim {
            milestone,
            unlocked_at: Utc::now(),
            transaction_id: None,
        })
        .collect();
    let catalog = badges::with_claims(&claims);

    group.bench_function("check_eligibility", |b| {
        b.iter(|| badges::check_eligibility(black_box(&catalog), black_box(60)))
    });

    group.bench_function("progress", |b| {
        b.iter(|| badges::progress(black_box(&catalog), black_box(42)))
    });

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let today = Utc::now().date_naive();
    let entry = new_entry(1);
    let dirty = "<script>alert(1)</script>Learned <b>Rust</b> ownership";

    c.bench_function("validate_entry", |b| {
        b.iter(|| validation::validate_entry(black_box(&entry), today))
    });

    c.bench_function("sanitize_input", |b| {
        b.iter(|| validation::sanitize_input(black_box(dirty)))
    });
}

fn bench_repository(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository");
    group.throughput(Throughput::Elements(1));

    group.bench_function("append_entry_memory", |b| {
        b.iter_batched(
            || Repository::new(Arc::new(MemoryStore::new())),
            |repo| {
                repo.append_entry(&Entry::new("bench-user", new_entry(1)))
                    .unwrap()
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("append_entry_sqlite", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let store = SqliteStore::open(dir.path().join("bench.db")).unwrap();
                (dir, Repository::new(Arc::new(store)))
            },
            |(_dir, repo)| {
                repo.append_entry(&Entry::new("bench-user", new_entry(1)))
                    .unwrap()
            },
            BatchSize::PerIteration,
        )
    });

    group.bench_function("entries_for_1000", |b| {
        let repo = Repository::new(Arc::new(MemoryStore::new()));
        for i in 0..1000 {
            let user = if i % 2 == 0 { "a" } else { "b" };
            repo.append_entry(&Entry::new(user, new_entry(i))).unwrap();
        }
        b.iter(|| repo.entries_for(black_box("a")).unwrap())
    });

    group.finish();
}

fn bench_rate_limit(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit");

    group.bench_function("check_under_limit", |b| {
        // Calls age out of the short window, so the deque stays small
        let limiter = SlidingWindowLimiter::new(10, Duration::from_micros(5));
        let start = Instant::now();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let _ = limiter.check_at(black_box("user"), start + Duration::from_micros(n));
        })
    });

    group.bench_function("check_many_keys", |b| {
        let limiter = SlidingWindowLimiter::new(10, Duration::from_secs(60));
        let keys: Vec<String> = (0..1000).map(|i| format!("user-{}", i)).collect();
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % keys.len();
            let _ = limiter.check(black_box(&keys[i]));
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_badges,
    bench_validation,
    bench_repository,
    bench_rate_limit
);
criterion_main!(benches);
