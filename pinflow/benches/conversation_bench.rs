//! Benchmarks for opening and releasing conversations.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pinflow::prelude::*;
use pinflow::testing::TestDriver;
use std::time::Duration;

fn conversation_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let driver = TestDriver::with_lease_timeout(8, Duration::from_secs(1));
    let manager = driver.manager().clone();

    c.bench_function("open_release", |b| {
        b.iter(|| {
            runtime.block_on(manager.require_conversation(async {
                Ok::<_, ConversationError>(black_box(42))
            }))
        });
    });

    let client = driver.client.clone();
    c.bench_function("pinned_request", |b| {
        b.iter(|| {
            let response = runtime.block_on(manager.require_conversation(async {
                client.execute(Request::get("_system", "/_api/version")).await
            }));
            driver.communication.reset();
            black_box(response)
        });
    });

    c.bench_function("thread_open_release", |b| {
        b.iter(|| {
            let conversation = manager.require_thread_conversation();
            black_box(conversation.is_ok())
        });
    });
}

criterion_group!(benches, conversation_benchmark);
criterion_main!(benches);
