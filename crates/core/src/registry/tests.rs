use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::error::ErrorKind;
use crate::testing::{Call, MockClient, MockSession};

const A: &str = "10.0.0.5:21";
const B: &str = "10.0.0.6:21";

fn registry() -> (MockClient, SessionRegistry<MockClient>) {
	let client = MockClient::new();
	(client.clone(), SessionRegistry::new(client))
}

#[tokio::test]
async fn acquire_connects_once_and_reuses() {
	let (client, registry) = registry();

	registry.acquire(A, "u", "p").await.unwrap();
	registry.acquire(A, "u", "p").await.unwrap();

	assert_eq!(client.connects(A), 1);
	assert_eq!(client.calls(A), vec![Call::Connect, Call::Authenticate { user: "u".into() }]);
	assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn new_entry_starts_idle() {
	let (_, registry) = registry();
	registry.acquire(A, "u", "p").await.unwrap();

	let infos = registry.snapshot();
	assert_eq!(infos.len(), 1);
	assert_eq!(infos[0].address, A);
	assert!(!infos[0].busy);
}

#[tokio::test]
async fn connect_failure_inserts_nothing() {
	let (client, registry) = registry();
	client.refuse(A);

	let err = registry.acquire(A, "u", "p").await.err().unwrap();

	assert_eq!(err.kind(), ErrorKind::Connect);
	assert!(err.to_string().contains("connection refused"), "{err}");
	assert!(registry.is_empty());
}

#[tokio::test]
async fn login_failure_closes_connection_and_inserts_nothing() {
	let (client, registry) = registry();
	client.reject_login(A);

	let err = registry.checkout(A, "u", "bad").await.err().unwrap();

	assert!(matches!(err, Error::Login { .. }), "got {err:?}");
	assert!(registry.is_empty());
	assert_eq!(client.closed(A), 1);
}

#[tokio::test]
async fn connect_failure_leaves_other_addresses_alone() {
	let (client, registry) = registry();
	registry.acquire(B, "u", "p").await.unwrap();
	client.refuse(A);

	assert!(registry.acquire(A, "u", "p").await.is_err());

	assert!(registry.contains(B));
	assert_eq!(registry.len(), 1);
	registry.acquire(B, "u", "p").await.unwrap();
	assert_eq!(client.connects(B), 1);
}

#[tokio::test]
async fn mark_busy_and_idle_toggle_flag() {
	let (_, registry) = registry();
	let handle = registry.acquire(A, "u", "p").await.unwrap();

	assert!(registry.mark_busy(&handle));
	assert!(registry.snapshot()[0].busy);

	assert!(registry.mark_idle(&handle));
	assert!(!registry.snapshot()[0].busy);
}

#[tokio::test]
async fn checkout_marks_busy_until_lease_ends() {
	let (_, registry) = registry();

	let lease = registry.checkout(A, "u", "p").await.unwrap();
	assert!(registry.snapshot()[0].busy);
	lease.finish();
	assert!(!registry.snapshot()[0].busy);

	let lease = registry.checkout(A, "u", "p").await.unwrap();
	drop(lease);
	assert!(!registry.snapshot()[0].busy);
}

#[tokio::test(start_paused = true)]
async fn mark_idle_refreshes_access_time_but_release_does_not() {
	let (_, registry) = registry();

	tokio::time::advance(Duration::from_secs(1)).await;
	let lease = registry.checkout(A, "u", "p").await.unwrap();
	tokio::time::advance(Duration::from_secs(300)).await;
	lease.finish();
	assert_eq!(registry.snapshot()[0].idle_for, Duration::ZERO);

	let lease = registry.checkout(A, "u", "p").await.unwrap();
	tokio::time::advance(Duration::from_secs(300)).await;
	drop(lease);
	assert_eq!(registry.snapshot()[0].idle_for, Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn evict_if_idle_respects_threshold() {
	let (client, registry) = registry();
	registry.acquire(A, "u", "p").await.unwrap();

	tokio::time::advance(Duration::from_secs(600)).await;
	assert!(!registry.evict_if_idle(A, DEFAULT_IDLE_TIMEOUT).await, "exactly at the threshold is not past it");

	tokio::time::advance(Duration::from_secs(1)).await;
	assert!(registry.evict_if_idle(A, DEFAULT_IDLE_TIMEOUT).await);
	assert!(registry.is_empty());
	assert_eq!(client.closed(A), 1);
}

#[tokio::test(start_paused = true)]
async fn busy_entry_is_never_evicted() {
	let (client, registry) = registry();
	let lease = registry.checkout(A, "u", "p").await.unwrap();

	tokio::time::advance(Duration::from_secs(86_400)).await;
	assert!(!registry.evict_if_idle(A, DEFAULT_IDLE_TIMEOUT).await);
	assert_eq!(registry.sweep(DEFAULT_IDLE_TIMEOUT).await, 0);
	assert_eq!(client.closed(A), 0);

	drop(lease);
	assert_eq!(registry.sweep(DEFAULT_IDLE_TIMEOUT).await, 1);
	assert_eq!(client.closed(A), 1);
}

#[tokio::test(start_paused = true)]
async fn sweep_only_takes_expired_entries() {
	let (client, registry) = registry();
	registry.acquire(A, "u", "p").await.unwrap();
	tokio::time::advance(Duration::from_secs(400)).await;
	registry.acquire(B, "u", "p").await.unwrap();
	tokio::time::advance(Duration::from_secs(201)).await;

	assert_eq!(registry.sweep(DEFAULT_IDLE_TIMEOUT).await, 1);
	assert!(!registry.contains(A));
	assert!(registry.contains(B));
	assert_eq!(client.closed(A), 1);
	assert_eq!(client.closed(B), 0);
}

#[tokio::test(start_paused = true)]
async fn stale_handle_cannot_mark_replacement_busy() {
	let (_, registry) = registry();
	let old = registry.acquire(A, "u", "p").await.unwrap();
	tokio::time::advance(Duration::from_secs(601)).await;
	assert!(registry.evict_if_idle(A, DEFAULT_IDLE_TIMEOUT).await);

	registry.acquire(A, "u", "p").await.unwrap();
	assert!(!registry.mark_busy(&old));
	assert!(!registry.snapshot()[0].busy);
}

#[tokio::test]
async fn handle_type_is_nameable_from_crate_root() {
	let (_, registry) = registry();
	let handle: crate::SessionHandle<MockSession> = registry.acquire(A, "u", "p").await.unwrap();
	assert_eq!(handle.address(), A);
	assert!(registry.mark_busy(&handle));
}

#[tokio::test]
async fn for_each_visits_every_entry() {
	let (_, registry) = registry();
	registry.acquire(A, "u", "p").await.unwrap();
	registry.acquire(B, "u", "p").await.unwrap();

	let mut seen = Vec::new();
	registry.for_each(|info| seen.push(info.address.clone()));
	assert_eq!(seen, vec![A.to_string(), B.to_string()]);
}

#[tokio::test]
async fn close_all_closes_every_session() {
	let (client, registry) = registry();
	registry.acquire(A, "u", "p").await.unwrap();
	registry.acquire(B, "u", "p").await.unwrap();

	registry.close_all().await;

	assert!(registry.is_empty());
	assert_eq!(client.closed(A), 1);
	assert_eq!(client.closed(B), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_first_requests_keep_a_single_entry() {
	let (client, registry) = registry();
	let registry = Arc::new(registry);

	let tasks: Vec<_> = (0..8)
		.map(|_| {
			let registry = Arc::clone(&registry);
			tokio::spawn(async move { registry.acquire(A, "u", "p").await.map(|_| ()) })
		})
		.collect();
	for task in tasks {
		task.await.unwrap().unwrap();
	}

	assert_eq!(registry.len(), 1);
	// Losers of the connect race close their extra session.
	assert_eq!(client.connects(A) - client.closed(A), 1);
}
