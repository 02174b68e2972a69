// Two replicas of the same "service" electing a singleton worker through a
// shared in-memory lease store, then failing over when the leader shuts
// down gracefully.
//
// Run with: cargo run --example singleton_worker

use leaselock::{Elector, ElectorConfig, InMemoryLeaseStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Both replicas share one store; in production this would be a Redis or
    // DynamoDB table with per-key TTL
    let store = Arc::new(InMemoryLeaseStore::new());

    let config = ElectorConfig {
        min_initial_delay: Duration::from_millis(100),
        max_initial_delay: Duration::from_millis(500),
        check_interval: Duration::from_secs(1),
        lease_timeout: Duration::from_secs(3),
        ..ElectorConfig::default()
    };

    let replica_a = Elector::new(store.clone(), config.clone())?;
    let replica_b = Elector::new(store.clone(), config)?;

    println!("replica A: {}", replica_a.instance_id());
    println!("replica B: {}", replica_b.instance_id());

    replica_a.start().await?;
    replica_b.start().await?;

    // Let the jitter windows close and the first cycles run
    sleep(Duration::from_secs(2)).await;

    for tick in 1..=3 {
        run_singleton_job(tick, "A", &replica_a).await;
        run_singleton_job(tick, "B", &replica_b).await;
        sleep(Duration::from_secs(1)).await;
    }

    // Graceful shutdown of whoever leads; the survivor takes over without
    // waiting out the lease TTL
    let (leader, survivor, survivor_name) = if replica_a.is_leader() {
        (&replica_a, &replica_b, "B")
    } else {
        (&replica_b, &replica_a, "A")
    };
    println!("stopping the current leader {}", leader.instance_id());
    leader.stop().await;

    sleep(Duration::from_secs(3)).await;
    println!(
        "replica {} is_leader: {}",
        survivor_name,
        survivor.is_leader()
    );

    replica_a.stop().await;
    replica_b.stop().await;
    Ok(())
}

async fn run_singleton_job(tick: u32, name: &str, elector: &Elector) {
    // The whole point: gate singleton work behind is_leader()
    if elector.is_leader() {
        println!("tick {}: replica {} runs the singleton job", tick, name);
    }
}
