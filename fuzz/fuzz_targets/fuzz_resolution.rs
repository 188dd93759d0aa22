#![no_main]

//! Fuzz target for registration and resolution sequences
//!
//! Mixes eager instances, well-behaved, failing and panicking factories and
//! checks that the container never leaves a key marked in resolution.

use arbitrary::Arbitrary;
use graph_injector::{Container, DiError};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, Arbitrary)]
struct Settings {
    retries: u8,
    name: String,
}

#[allow(dead_code)]
#[derive(Debug)]
struct Client {
    settings: Arc<Settings>,
}

#[allow(dead_code)]
#[derive(Debug)]
struct Gateway {
    client: Arc<Client>,
}

/// How a factory behaves
#[derive(Clone, Copy, Debug, Arbitrary)]
enum Behavior {
    Build,
    Fail,
    Panic,
    DependOnGateway,
}

#[derive(Debug, Arbitrary)]
enum Op {
    RegisterSettings(Settings),
    ClientFactory(Behavior),
    GatewayFactory(Behavior),
    GetSettings,
    GetClient,
    GetGateway,
    Contains,
    Diagnostics,
}

fn client_factory(container: &Container, behavior: Behavior) {
    container.register_try_factory(move |r| match behavior {
        Behavior::Build => Ok(Client {
            settings: r.get::<Settings>()?,
        }),
        Behavior::Fail => Err(DiError::creation_failed::<Client>("fuzz")),
        Behavior::Panic => panic!("fuzz panic"),
        Behavior::DependOnGateway => {
            r.get::<Gateway>()?;
            Ok(Client {
                settings: r.get::<Settings>()?,
            })
        }
    });
}

fn gateway_factory(container: &Container, behavior: Behavior) {
    container.register_factory(move |r| match behavior {
        Behavior::Build | Behavior::DependOnGateway => Gateway {
            client: r.require::<Client>(),
        },
        Behavior::Fail => std::panic::panic_any(DiError::creation_failed::<Gateway>("fuzz")),
        Behavior::Panic => panic!("fuzz panic"),
    });
}

fuzz_target!(|ops: Vec<Op>| {
    let container = Container::builder()
        .resolution_timeout(Duration::from_secs(2))
        .build();
    let mut has_settings = false;

    for op in ops.into_iter().take(64) {
        match op {
            Op::RegisterSettings(settings) => {
                container.register(settings);
                has_settings = true;
            }
            Op::ClientFactory(behavior) => client_factory(&container, behavior),
            Op::GatewayFactory(behavior) => gateway_factory(&container, behavior),
            Op::GetSettings => {
                let result = container.get::<Settings>();
                assert_eq!(result.is_ok(), has_settings);
            }
            Op::GetClient => {
                if let Err(e) = container.get::<Client>() {
                    assert!(!e.is_retryable(), "no factory here blocks: {e}");
                }
            }
            Op::GetGateway => {
                let first = container.get::<Gateway>();
                // Once constructed, always the same instance
                if let Ok(first) = first {
                    let second = container.get::<Gateway>().unwrap();
                    assert!(Arc::ptr_eq(&first, &second));
                }
            }
            Op::Contains => {
                assert_eq!(container.contains::<Settings>(), has_settings);
            }
            Op::Diagnostics => {
                let _ = container.diagnostics().to_string();
            }
        }

        // Every resolution has settled by the time `get` returns
        assert!(container.diagnostics().resolving.is_empty());
    }
});
