//! Timing engine hot path: frame copies and a full run on a heap segment.

use criterion::{Criterion, criterion_group, criterion_main};
use shm_bench_common::consts::BUFSIZE;
use shm_bench_common::layout::ack_frame;
use shm_bench_ipc::{BinarySemaphore, HeapSegment, IpcResult};
use shm_bench_server::{CycleCounter, TimingEngine};
use std::hint::black_box;

/// Lock that is always free; isolates the copy loop from semop cost.
struct UncontendedLock;

impl BinarySemaphore for UncontendedLock {
    fn lock(&self) -> IpcResult<()> {
        Ok(())
    }

    fn unlock(&self) -> IpcResult<()> {
        Ok(())
    }
}

fn bench_frame_copy(c: &mut Criterion) {
    let segment = HeapSegment::new(BUFSIZE).expect("heap segment");
    let frame = ack_frame();

    c.bench_function("write_frame_64b", |b| {
        b.iter(|| segment.view().write_frame(black_box(&frame)))
    });
}

fn bench_full_run(c: &mut Criterion) {
    let segment = HeapSegment::new(BUFSIZE).expect("heap segment");
    let engine = TimingEngine::new(CycleCounter);

    c.bench_function("run_benchmark_1000_trials", |b| {
        b.iter(|| {
            engine
                .run_benchmark(segment.view(), &UncontendedLock)
                .expect("uncontended lock")
        })
    });
}

criterion_group!(benches, bench_frame_copy, bench_full_run);
criterion_main!(benches);
