#![no_main]

//! Fuzz target for concurrent resolution
//!
//! Many threads race to resolve the same lazily constructed keys while
//! others register eager instances. Every thread that resolves a key must
//! see the instance stored for it.

use arbitrary::Arbitrary;
use graph_injector::Container;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

#[allow(dead_code)]
#[derive(Debug)]
struct Pool {
    size: u32,
}

#[allow(dead_code)]
#[derive(Debug, Arbitrary)]
struct SharedConfig {
    value: u32,
}

#[allow(dead_code)]
#[derive(Debug)]
struct Repository {
    pool: Arc<Pool>,
}

/// Thread operation
#[derive(Debug, Clone, Copy, Arbitrary)]
enum ThreadOp {
    GetPool,
    GetRepository,
    TryGetConfig,
    Contains,
    RegisterConfig(u32),
}

#[derive(Debug, Arbitrary)]
struct ConcurrentScenario {
    // Number of threads (clamped to 1-8)
    thread_count: u8,
    ops_per_thread: Vec<ThreadOp>,
}

fuzz_target!(|scenario: ConcurrentScenario| {
    let created = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&created);

    let container = Container::new();
    container.register_factory(move |_| Pool {
        size: counter.fetch_add(1, Ordering::SeqCst) + 1,
    });
    container.register_factory(|r| Repository {
        pool: r.require::<Pool>(),
    });

    let thread_count = (scenario.thread_count % 8).max(1) as usize;
    let ops = scenario.ops_per_thread;

    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let container = container.clone();
            let ops = ops.clone();
            thread::spawn(move || {
                let mut pools = Vec::new();
                for op in ops.into_iter().take(50) {
                    match op {
                        ThreadOp::GetPool => pools.push(container.get::<Pool>().unwrap()),
                        ThreadOp::GetRepository => {
                            pools.push(Arc::clone(&container.get::<Repository>().unwrap().pool))
                        }
                        ThreadOp::TryGetConfig => {
                            let _ = container.try_get::<SharedConfig>();
                        }
                        ThreadOp::Contains => {
                            assert!(container.contains::<Pool>());
                        }
                        ThreadOp::RegisterConfig(value) => {
                            container.register(SharedConfig { value });
                        }
                    }
                }
                pools
            })
        })
        .collect();

    let pools: Vec<Arc<Pool>> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    // Constructed at most once, shared by everyone
    assert!(created.load(Ordering::SeqCst) <= 1);
    assert!(pools.iter().all(|p| Arc::ptr_eq(p, &pools[0])));
    assert!(container.diagnostics().resolving.is_empty());
});
