//! Performance benchmarks for Docnode core tree operations
//!
//! Run with: `cargo bench -p docnode-core`
//!
//! These benchmarks measure the two write paths:
//! - Point mutations (insert_first_child under a growing parent)
//! - Full-tree reconciliation of wide and deep documents
//! - Snapshot flattening without store access

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use docnode_core::db::MemoryStore;
use docnode_core::models::{DocumentTreeUpdate, PageTreeEntry};
use docnode_core::services::NodeService;
use docnode_core::tree::TreeSnapshot;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Document "D1" with `width` top-level pages, each holding `depth` nested pages
async fn setup_document(width: usize, depth: usize) -> NodeService {
    let service = NodeService::new(Arc::new(MemoryStore::new()));
    service.register_document_node("D1").await.unwrap();

    for w in 0..width {
        let top = format!("P{}", w);
        service.insert_first_in_document("D1", &top).await.unwrap();
        let mut parent = top;
        for d in 0..depth {
            let child = format!("P{}-{}", w, d);
            service
                .insert_first_child(&parent, "D1", &child)
                .await
                .unwrap();
            parent = child;
        }
    }
    service
}

fn nested_update(width: usize, depth: usize) -> DocumentTreeUpdate {
    let pages = (0..width)
        .map(|w| {
            let chain: Vec<String> = std::iter::once(format!("P{}", w))
                .chain((0..depth).map(|d| format!("P{}-{}", w, d)))
                .collect();
            let mut ids = chain.into_iter().rev();
            let innermost = PageTreeEntry::leaf(ids.next().unwrap_or_default(), 1);
            ids.fold(innermost, |child, id| {
                PageTreeEntry::leaf(id, 1).with_children(vec![child])
            })
        })
        .collect();
    DocumentTreeUpdate::new("D1", pages)
}

/// Benchmark point inserts under one parent
fn bench_point_mutations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("insert_first_child", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let service = setup_document(1, 0).await;

                let start = std::time::Instant::now();
                for i in 0..iters {
                    service
                        .insert_first_child("P0", "D1", &format!("C{}", i))
                        .await
                        .unwrap();
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark whole-document reconciliation
fn bench_reconcile(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("reconcile");
    group.sample_size(20);

    for (width, depth) in [(100, 0), (10, 9), (1, 99)] {
        let label = format!("{}x{}", width, depth + 1);
        group.bench_with_input(BenchmarkId::from_parameter(label), &(width, depth), |b, &(w, d)| {
            b.iter_custom(|iters| {
                rt.block_on(async {
                    let service = setup_document(w, d).await;

                    let start = std::time::Instant::now();
                    for _ in 0..iters {
                        // Resubmit the current view so every round passes its version checks
                        let tree = service.get_document_tree("D1").await.unwrap();
                        service
                            .update_document_tree(&tree.into_update())
                            .await
                            .unwrap();
                    }
                    start.elapsed()
                })
            });
        });
    }

    group.finish();
}

/// Benchmark snapshot flattening alone
fn bench_snapshot(c: &mut Criterion) {
    let update = nested_update(50, 19);

    c.bench_function("snapshot_build_1000_pages", |b| {
        b.iter(|| TreeSnapshot::build(black_box(&update)).unwrap());
    });
}

criterion_group!(benches, bench_point_mutations, bench_reconcile, bench_snapshot);
criterion_main!(benches);
