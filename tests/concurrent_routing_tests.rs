/// Concurrent routing tests
///
/// Many routing calls sharing one router and one change ledger.
/// Run with: cargo test --test concurrent_routing_tests

use futures::future::join_all;
use shardrouter::{
    ChangeTracker, FileBasedHashRingRouter, FileType, InMemoryCatalog, InMemoryLedger,
    LedgerStore, Router, RouterOptions, RoutingRequest, ShardStamp, StaticTopology,
};
use std::sync::Arc;
use tokio::sync::Barrier;

async fn shared_router(
    nodes: &[&str],
    files: u64,
) -> (Arc<InMemoryCatalog>, Arc<FileBasedHashRingRouter>) {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.create_collection("C").await.unwrap();
    for id in 1..=files {
        catalog.add_file(id, "C", FileType::Raw, 1).await.unwrap();
    }

    let topology = Arc::new(StaticTopology::new(nodes.iter().copied()));
    let router = FileBasedHashRingRouter::create(
        RouterOptions::new()
            .writable_topo(topology.clone())
            .readonly_topo(topology)
            .catalog(catalog.clone())
            .ledger(Arc::new(InMemoryLedger::new())),
    )
    .unwrap();

    (catalog, Arc::new(router))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_report_each_update_once() {
    let (_, router) = shared_router(&["A", "B"], 50).await;
    let num_tasks = 16;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let mut handles = vec![];
    for _ in 0..num_tasks {
        let router = Arc::clone(&router);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            router.routing(RoutingRequest::new("C")).await.unwrap()
        }));
    }

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let mut reported: Vec<u64> = results
        .iter()
        .flat_map(|result| result.iter().flat_map(|(_, route)| route.update_files.clone()))
        .collect();
    reported.sort_unstable();
    assert_eq!(reported, (1..=50).collect::<Vec<_>>());

    for result in &results {
        assert_eq!(result.all_search_files().len(), 50);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_touches_are_not_lost() {
    let (catalog, router) = shared_router(&["A"], 10).await;
    router.routing(RoutingRequest::new("C")).await.unwrap();

    let mut reported = Vec::new();
    for round in 2..=5u64 {
        catalog.touch_file(round, round * 10).await.unwrap();

        let calls = (0..8).map(|_| {
            let router = Arc::clone(&router);
            async move { router.routing(RoutingRequest::new("C")).await.unwrap() }
        });
        for result in join_all(calls).await {
            reported.extend(result.get("A").unwrap().update_files.clone());
        }
    }

    assert_eq!(reported, vec![2, 3, 4, 5]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tracker_threads_on_distinct_nodes() {
    let ledger: Arc<dyn LedgerStore> = Arc::new(InMemoryLedger::new());
    let tracker = ChangeTracker::new(ledger.clone());
    let stamps: Vec<ShardStamp> = (1..=20).map(|id| ShardStamp::new(id, 3)).collect();

    let tasks = (0..8).map(|n| {
        let tracker = tracker.clone();
        let stamps = stamps.clone();
        tokio::spawn(async move { tracker.diff(&format!("node-{}", n), &stamps) })
    });

    for changed in join_all(tasks).await {
        assert_eq!(changed.unwrap().len(), 20);
    }
    assert_eq!(ledger.node_count(), 8);
}
