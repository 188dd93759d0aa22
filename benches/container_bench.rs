//! Benchmarks for the resolution engine

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use graph_injector::{Container, TypeKey};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct SmallService {
    value: i32,
}

#[allow(dead_code)]
struct MediumService {
    name: String,
    values: Vec<i32>,
}

#[allow(dead_code)]
struct LargeService {
    data: Vec<u8>,
}

// Chain used for first-resolution benchmarks: Top -> Middle -> Leaf
struct Leaf;
#[allow(dead_code)]
struct Middle(Arc<Leaf>);
#[allow(dead_code)]
struct Top(Arc<Middle>);

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("instance_small", |b| {
        b.iter(|| {
            let container = Container::new();
            container.register(SmallService { value: 42 });
            black_box(container)
        })
    });

    group.bench_function("instance_medium", |b| {
        b.iter(|| {
            let container = Container::new();
            container.register(MediumService {
                name: "test".to_string(),
                values: vec![1, 2, 3, 4, 5],
            });
            black_box(container)
        })
    });

    group.bench_function("factory", |b| {
        b.iter(|| {
            let container = Container::new();
            container.register_factory(|_| SmallService { value: 42 });
            black_box(container)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let container = Container::new();
    container.register(SmallService { value: 42 });
    container.register_factory(|_| MediumService {
        name: "test".to_string(),
        values: vec![1, 2, 3, 4, 5],
    });
    // Construct once so the benchmark measures the store path
    container.get::<MediumService>().unwrap();

    group.bench_function("get_instance", |b| {
        b.iter(|| black_box(container.get::<SmallService>().unwrap()))
    });

    group.bench_function("get_constructed", |b| {
        b.iter(|| black_box(container.get::<MediumService>().unwrap()))
    });

    group.bench_function("get_erased", |b| {
        let key = TypeKey::of::<SmallService>();
        b.iter(|| black_box(container.get_erased(&key).unwrap()))
    });

    group.bench_function("contains_check", |b| {
        b.iter(|| black_box(container.contains::<SmallService>()))
    });

    group.bench_function("try_get_not_found", |b| {
        b.iter(|| black_box(container.try_get::<LargeService>()))
    });

    group.finish();
}

fn bench_first_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_resolution");

    // Each factory invocation runs on a worker thread, so this is dominated
    // by thread spawn cost
    group.bench_function("chain_of_3", |b| {
        b.iter_batched(
            || {
                let container = Container::new();
                container.register_factory(|_| Leaf);
                container.register_factory(|r| Middle(r.require::<Leaf>()));
                container.register_factory(|r| Top(r.require::<Middle>()));
                container
            },
            |container| black_box(container.get::<Top>().unwrap()),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let container = Container::new();
        container.register(SmallService { value: 42 });

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.get::<SmallService>().unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.bench_function("concurrent_first_resolution_8", |b| {
        b.iter_batched(
            || {
                let container = Container::new();
                container.register_factory(|_| SmallService { value: 1 });
                container
            },
            |container| {
                let handles: Vec<_> = (0..8)
                    .map(|_| {
                        let c = container.clone();
                        thread::spawn(move || c.get::<SmallService>().unwrap())
                    })
                    .collect();
                for h in handles {
                    black_box(h.join().unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_first_resolution,
    bench_concurrent,
);

criterion_main!(benches);
