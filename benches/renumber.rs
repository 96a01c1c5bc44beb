//! Benchmark for the footnote renumbering pass, which rewrites every
//! reference marker on each commit and removal.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use doc_annotator::footnotes::FootnoteRegistry;

fn build_document(words: usize) -> (String, Vec<String>) {
    let terms: Vec<String> = (0..words).map(|i| format!("term{:03}", i)).collect();
    let sentences: Vec<String> = terms
        .iter()
        .map(|term| format!("The {} appears in this sentence.", term))
        .collect();
    (sentences.join(" "), terms)
}

fn committed_registry(words: usize) -> (FootnoteRegistry, String) {
    let (mut document, terms) = build_document(words);
    let mut registry = FootnoteRegistry::new();
    // Commit in reverse order so every commit renumbers the whole list.
    for term in terms.iter().rev() {
        registry.commit(&mut document, term, format!("{}\nbody", term));
    }
    (registry, document)
}

fn bench_renumber(c: &mut Criterion) {
    let mut group = c.benchmark_group("renumber");
    for words in [10usize, 50, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(words), &words, |b, &words| {
            let (mut registry, mut document) = committed_registry(words);
            b.iter(|| {
                registry.renumber(black_box(&mut document));
            });
        });
    }
    group.finish();
}

fn bench_commit_remove_cycle(c: &mut Criterion) {
    c.bench_function("commit_remove_cycle", |b| {
        let (mut document, terms) = build_document(50);
        let mut registry = FootnoteRegistry::new();
        // Leave the first term uncommitted; the cycle commits and removes it
        // against 49 settled footnotes.
        for term in terms.iter().skip(1) {
            registry.commit(&mut document, term, format!("{}\nbody", term));
        }
        b.iter(|| {
            let id = registry
                .commit(&mut document, "term000", "term000\nbody".to_string())
                .unwrap();
            registry.remove(&mut document, id);
        });
    });
}

criterion_group!(benches, bench_renumber, bench_commit_remove_cycle);
criterion_main!(benches);
