//! Benchmarks for pipe invocation and endpoint lookup.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pipebus::context::{Address, BaseContext};
use pipebus::endpoint::{SendEndpointCache, SendEndpointProvider};
use pipebus::pipeline::{FnFilter, Pipe, PipeBuilder};
use pipebus::testing::InMemoryTransport;
use std::sync::Arc;

fn pipe_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let mut group = c.benchmark_group("pipe_send");

    for filters in [0_usize, 4, 16] {
        let mut builder = PipeBuilder::<BaseContext>::new("bench");
        for i in 0..filters {
            builder = builder.filter(FnFilter::new(format!("f{i}"), |_ctx: &BaseContext| Ok(())));
        }
        let pipe = builder.build().expect("pipe");

        group.bench_with_input(BenchmarkId::from_parameter(filters), &pipe, |b, pipe| {
            b.iter(|| {
                let ctx = BaseContext::new();
                rt.block_on(pipe.send(black_box(&ctx))).expect("send");
            });
        });
    }
    group.finish();
}

fn endpoint_cache_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let cache = SendEndpointCache::new(Arc::new(InMemoryTransport::new()));
    let address = Address::parse("loopback://local/orders").expect("address");
    rt.block_on(cache.get_send_endpoint(&address)).expect("warm");

    c.bench_function("endpoint_cache_hit", |b| {
        b.iter(|| {
            rt.block_on(cache.get_send_endpoint(black_box(&address)))
                .expect("resolve")
        });
    });
}

criterion_group!(benches, pipe_benchmark, endpoint_cache_benchmark);
criterion_main!(benches);
