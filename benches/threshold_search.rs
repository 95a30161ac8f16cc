use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use topic_fca::incidence::IncidenceMatrix;
use topic_fca::threshold::{row_normalize, ThresholdSelector};

/// Deterministic sparse-ish scores: each document gets a handful of topics
fn generate_scores(docs: usize, topics: usize) -> IncidenceMatrix<f64> {
    let mut data = vec![0.0; docs * topics];
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    for d in 0..docs {
        for _ in 0..10 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let t = (state % topics as u64) as usize;
            data[d * topics + t] = (state % 1000) as f64 / 1000.0;
        }
    }
    IncidenceMatrix::new(
        (0..docs).map(|i| i.to_string()),
        (0..topics).map(|i| i.to_string()),
        data,
    )
    .unwrap()
}

fn benchmark_threshold_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold_search");

    for docs in [1_000, 10_000, 50_000] {
        let matrix = generate_scores(docs, 200);
        let selector = ThresholdSelector::new(0.1, 100);

        group.bench_with_input(BenchmarkId::new("apply", format!("{docs}_docs")), &matrix, |b, m| {
            b.iter(|| black_box(selector.apply(m)))
        });
    }

    group.finish();
}

fn benchmark_row_normalize(c: &mut Criterion) {
    let matrix = generate_scores(10_000, 200);
    c.bench_function("row_normalize_10000x200", |b| b.iter(|| black_box(row_normalize(&matrix))));
}

criterion_group!(benches, benchmark_threshold_search, benchmark_row_normalize);
criterion_main!(benches);
