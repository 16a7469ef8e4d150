//! Fingerprinting and full-run benchmarks
//!
//! ```bash
//! cargo bench --bench fingerprint
//! ```

use chrono::{Duration, Utc};
use content_audit::audit::{
    AuditOrchestrator, CandidateItem, ContentKind, Fingerprinter, HeuristicScorer,
    InMemoryCandidateStore, RecordingSink, StaticContextProvider, ThresholdProfiles,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

const TITLES: &[&str] = &[
    "Subir precio del menú ejecutivo",
    "Aumentar ticket promedio con combos",
    "Mejorar atención telefónica en horas pico",
    "Reducir desperdicio en cocina",
    "Lanzar campaña en redes sociales",
    "Fidelizar clientes frecuentes con tarjeta de puntos",
];

fn candidates(count: usize) -> Vec<CandidateItem> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            CandidateItem::new(
                format!("item-{}", i),
                ContentKind::Mission,
                format!("{} {}", TITLES[i % TITLES.len()], i / TITLES.len()),
            )
            .with_description("Ajustar la oferta durante las próximas 4 semanas y medir el 10% de mejora")
            .with_created_at(now - Duration::seconds(i as i64))
        })
        .collect()
}

fn bench_fingerprint(c: &mut Criterion) {
    let fingerprinter = Fingerprinter::default();
    let items = candidates(TITLES.len());

    c.bench_function("concept_hash", |b| {
        b.iter(|| {
            for item in &items {
                black_box(fingerprinter.concept_hash(&item.title, item.description_text()));
            }
        })
    });

    c.bench_function("intent_signature", |b| {
        b.iter(|| {
            for item in &items {
                black_box(fingerprinter.intent_signature(
                    &item.title,
                    item.description_text(),
                    Some(item.kind),
                ));
            }
        })
    });
}

fn bench_audit_run(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("audit_run");

    for size in [10usize, 50, 200] {
        let store = Arc::new(InMemoryCandidateStore::new());
        runtime.block_on(store.insert_many("bench", candidates(size)));

        let orchestrator = AuditOrchestrator::new(
            store,
            Arc::new(StaticContextProvider::new("ventas")),
            Arc::new(HeuristicScorer::new()),
            Arc::new(RecordingSink::new()),
            ThresholdProfiles::default(),
        )
        .unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                runtime
                    .block_on(orchestrator.run("bench", ContentKind::Mission))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_audit_run);
criterion_main!(benches);
