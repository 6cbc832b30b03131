//! Waiting-list benchmark suite.
//!
//! Measures admission and claim throughput:
//! - Single producer: enqueue, claim, finish cycles
//! - Contended: producer threads racing a claiming thread
//! - Position queries on a deep list
//!
//! Run with: cargo bench --bench waiting_list
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::thread;

use console_trade_pool::{
    DeviceId, OperationKind, Outcome, SubmitterId, TradeCode, WaitingList, WorkItem,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const QUEUE_DEPTHS: &[usize] = &[10, 100, 1_000];
const PRODUCER_COUNTS: &[u64] = &[2, 4, 8];
const ITEMS_PER_PRODUCER: u64 = 250;

fn item(submitter: u64) -> WorkItem {
    WorkItem::new(
        SubmitterId::new(submitter),
        "bench",
        OperationKind::Exchange,
        TradeCode::new(1234),
    )
}

fn device() -> DeviceId {
    DeviceId::from_u32(1).expect("non-zero")
}

/// Claims and finishes the next item. Returns `false` if none pending.
fn serve_one(list: &WaitingList) -> bool {
    let Some(next) = list.dequeue_next() else {
        return false;
    };
    if list.mark_active(next.id, device()).is_ok() {
        let _ = list.mark_terminal(next.id, &Outcome::succeeded());
    }
    true
}

// ============================================================================
// Benchmark: Single Producer Lifecycle
// ============================================================================

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");

    for &depth in QUEUE_DEPTHS {
        group.bench_with_input(BenchmarkId::new("fill_and_drain", depth), &depth, |b, &depth| {
            b.iter(|| {
                let list = WaitingList::new(depth);
                for s in 0..depth as u64 {
                    list.enqueue(item(s));
                }
                while serve_one(&list) {}
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Contended Admission
// ============================================================================

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(20);

    for &producers in PRODUCER_COUNTS {
        group.bench_with_input(
            BenchmarkId::new("producers", producers),
            &producers,
            |b, &producers| {
                b.iter(|| {
                    let list = Arc::new(WaitingList::new(64));

                    let handles: Vec<_> = (0..producers)
                        .map(|p| {
                            let list = Arc::clone(&list);
                            thread::spawn(move || {
                                for i in 0..ITEMS_PER_PRODUCER {
                                    list.enqueue(item(p * 1_000_000 + i));
                                }
                            })
                        })
                        .collect();

                    let consumer = {
                        let list = Arc::clone(&list);
                        thread::spawn(move || {
                            for _ in 0..ITEMS_PER_PRODUCER {
                                serve_one(&list);
                            }
                        })
                    };

                    for handle in handles {
                        handle.join().expect("producer");
                    }
                    consumer.join().expect("consumer");
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: Position Queries
// ============================================================================

fn bench_position(c: &mut Criterion) {
    let mut group = c.benchmark_group("position");

    for &depth in QUEUE_DEPTHS {
        let list = WaitingList::new(depth);
        for s in 0..depth as u64 {
            list.enqueue(item(s));
        }
        let last = SubmitterId::new(depth as u64 - 1);

        group.bench_with_input(BenchmarkId::new("last_of", depth), &last, |b, &last| {
            b.iter(|| list.position(last));
        });
    }

    group.finish();
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(benches, bench_lifecycle, bench_contended, bench_position);
criterion_main!(benches);
