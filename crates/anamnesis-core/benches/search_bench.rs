//! Benchmarks for the CPU-bound stages of the read and write paths:
//! extraction, fusion and ranking. Store/Embedder calls are the
//! suspension points (§5) and are deliberately not benchmarked here.
//!
//! Run with: cargo bench -p anamnesis-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use anamnesis_core::config::{ClaimExtractorConfig, EntityExtractorConfig, FusionConfig, RankingConfig};
use anamnesis_core::extract::{ClaimExtractor, EntityExtractor};
use anamnesis_core::fuse::{FusionInput, FusionItem, ResultFuser};
use anamnesis_core::model::Metadata;
use anamnesis_core::rank::{RankingContext, ResultRanker};

const SAMPLE_TEXT: &str = "Dr. Jane Smith works at Acme Inc. in New York. \
Smoking causes cancer and heart disease. According to research, exercise \
improves cardiovascular health. The meeting is scheduled for 2024-03-15. \
Contact jane.smith@acme.com or call 555-123-4567 for more details. \
Machine learning is defined as the study of algorithms that improve through \
experience. Due to rising costs, the company relaxed its hiring plan.";

fn bench_entity_extraction(c: &mut Criterion) {
    let extractor = EntityExtractor::new(EntityExtractorConfig::default());
    c.bench_function("entity_extract_sample", |b| {
        b.iter(|| black_box(extractor.extract(black_box(SAMPLE_TEXT), "bench")));
    });
}

fn bench_claim_extraction(c: &mut Criterion) {
    let extractor = ClaimExtractor::new(ClaimExtractorConfig::default());
    c.bench_function("claim_extract_sample", |b| {
        b.iter(|| black_box(extractor.extract(black_box(SAMPLE_TEXT), "bench")));
    });
}

fn fusion_inputs(n: usize) -> Vec<FusionInput> {
    let make_items = |method: &str, offset: usize| -> Vec<FusionItem> {
        (0..n)
            .map(|i| FusionItem {
                id: format!("doc-{}", offset + i),
                content: format!("content for document {}", offset + i),
                score: 1.0 - (i as f64 / n as f64),
                rank: i + 1,
                metadata: Metadata::new(),
            })
            .collect()
    };

    vec![
        FusionInput {
            method: "vector".into(),
            weight: 1.0,
            results: make_items("vector", 0),
        },
        FusionInput {
            method: "keyword".into(),
            weight: 1.0,
            results: make_items("keyword", n / 2),
        },
        FusionInput {
            method: "graph".into(),
            weight: 0.5,
            results: make_items("graph", n / 4),
        },
    ]
}

fn bench_rrf_fusion(c: &mut Criterion) {
    let fuser = ResultFuser::new(FusionConfig::default());
    c.bench_function("rrf_fuse_50x3", |b| {
        b.iter_batched(
            || fusion_inputs(50),
            |inputs| black_box(fuser.fuse(inputs).unwrap()),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_result_ranking(c: &mut Criterion) {
    let fuser = ResultFuser::new(FusionConfig::default());
    let (fused, _stats) = fuser.fuse(fusion_inputs(50)).unwrap();
    let ranker = ResultRanker::new(RankingConfig::default());
    let ctx = RankingContext::new("document");

    c.bench_function("rank_50_fused_results", |b| {
        b.iter_batched(
            || fused.clone(),
            |results| black_box(ranker.rank(results, &ctx)),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_entity_extraction,
    bench_claim_extraction,
    bench_rrf_fusion,
    bench_result_ranking,
);
criterion_main!(benches);
