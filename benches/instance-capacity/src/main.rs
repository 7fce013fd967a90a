//! # Instance Capacity
//!
//! Measures bulk instance tree throughput on a server tree with a replicator
//! attached.
//!
//! ## Run
//!
//! ```bash
//! cargo run --release -p instance-capacity -- 100000
//! ```
//!
//! ## Metrics
//!
//! - Create + parent under Workspace (assigns network ids, emits packets)
//! - Property writes
//! - Clone of a populated Model
//! - Client-side apply of the packet stream
//! - Destroy (recycles network ids)

use std::sync::Arc;
use std::time::{Duration, Instant};

use blox_common::{ClassFactory, InstanceTree, PropertyValue, TreeConfig};
use blox_networking::{drain, ClientReplicator, ServerReplicator};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_INSTANCES: usize = 10_000;

fn report(label: &str, count: usize, elapsed: Duration) {
    let per_sec = count as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    println!(
        "   ✓ {:<28} {:>8} in {:>9.2}ms ({:.0}/s)",
        label,
        count,
        elapsed.as_secs_f64() * 1000.0,
        per_sec
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let target = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_INSTANCES);

    println!("Blox instance capacity: {} instances", target);
    println!();

    let factory = Arc::new(ClassFactory::with_core_classes());
    let mut server = InstanceTree::new(
        Arc::clone(&factory),
        TreeConfig {
            server: true,
            ..Default::default()
        },
    );
    let replicator = ServerReplicator::new();
    let outbox = replicator.outbox();
    server.attach_replicator(Box::new(replicator));
    server.create_data_model();
    let Some(workspace) = server.service("Workspace") else {
        eprintln!("DataModel has no Workspace");
        return;
    };

    // Test 1: create + parent
    let start = Instant::now();
    let Ok(Some(model)) = server.create_child("Model", workspace) else {
        eprintln!("Could not create Model");
        return;
    };
    let mut parts = Vec::with_capacity(target);
    for _ in 0..target {
        match server.create_child("Part", model) {
            Ok(Some(part)) => parts.push(part),
            Ok(None) => break,
            Err(e) => {
                eprintln!("create failed: {}", e);
                break;
            }
        }
    }
    report("create + parent", parts.len(), start.elapsed());

    // Test 2: property writes
    let start = Instant::now();
    for (i, part) in parts.iter().enumerate() {
        if let Err(e) = server.set_property(*part, "Transparency", PropertyValue::Double((i % 10) as f64 / 10.0)) {
            eprintln!("set failed: {}", e);
            break;
        }
    }
    report("property writes", parts.len(), start.elapsed());

    // Test 3: clone
    let start = Instant::now();
    let copy = server.clone_instance(model).ok().flatten();
    report("clone model", parts.len() + 1, start.elapsed());

    // Test 4: client apply
    let packets = drain(&outbox);
    let mut client = InstanceTree::new(factory, TreeConfig::default());
    client.create_data_model();
    let mut applier = ClientReplicator::new();
    let start = Instant::now();
    if let Err(e) = applier.apply_all(&mut client, &packets) {
        eprintln!("apply failed: {}", e);
    }
    report("client apply", packets.len(), start.elapsed());
    info!(
        "Client holds {} instances, dropped {} packets",
        client.instance_count(),
        applier.dropped()
    );

    // Test 5: destroy
    let start = Instant::now();
    if let Some(copy) = copy {
        if let Err(e) = server.destroy(copy) {
            eprintln!("destroy failed: {}", e);
        }
    }
    if let Err(e) = server.destroy(model) {
        eprintln!("destroy failed: {}", e);
    }
    report("destroy", parts.len() * 2 + 2, start.elapsed());

    println!();
    println!("   Server instances left: {}", server.instance_count());
    println!("   Packets queued after destroy: {}", drain(&outbox).len());
}
