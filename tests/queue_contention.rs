//! Integration tests for queue claiming under contention and lease recovery.

use docket::{
    AtomicStore, DocketError, ItemFilter, ItemId, MemoryStore, PersistedQueue, QueueConfig,
    QueueState, Queueable, Timestamp,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const HOUR: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug, Default)]
struct Job {
    id: ItemId,
    state: QueueState,
    changed: Timestamp,
    payload: String,
}

impl Job {
    fn new(payload: &str) -> Self {
        Job {
            payload: payload.to_string(),
            ..Default::default()
        }
    }
}

impl Queueable for Job {
    fn id(&self) -> ItemId {
        self.id
    }
    fn set_id(&mut self, id: ItemId) {
        self.id = id;
    }
    fn state(&self) -> QueueState {
        self.state
    }
    fn set_state(&mut self, state: QueueState) {
        self.state = state;
    }
    fn last_state_changed(&self) -> Timestamp {
        self.changed
    }
    fn set_last_state_changed(&mut self, at: Timestamp) {
        self.changed = at;
    }
}

fn queue_with_staleness(stale_after: Duration) -> (Arc<MemoryStore<Job>>, PersistedQueue<Job>) {
    let store = Arc::new(MemoryStore::new());
    let queue = PersistedQueue::new(
        store.clone() as Arc<dyn AtomicStore<Job>>,
        QueueConfig::new("app", "jobs", stale_after),
    )
    .unwrap();
    (store, queue)
}

/// Claim in a loop until the sweeper hands something back.
fn wait_for_claim(queue: &PersistedQueue<Job>, patience: Duration) -> Job {
    let deadline = Instant::now() + patience;
    loop {
        if let Some(job) = queue.dequeue_begin().unwrap() {
            return job;
        }
        if Instant::now() > deadline {
            panic!("item was never reclaimed");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

// --- Claim exclusivity ---

#[test]
fn test_concurrent_claims_never_hand_out_the_same_item() {
    let (_store, queue) = queue_with_staleness(HOUR);
    let queue = Arc::new(queue);

    let mut enqueued = HashSet::new();
    for i in 0..6 {
        let mut job = Job::new(&format!("job-{}", i));
        queue.enqueue(&mut job).unwrap();
        enqueued.insert(job.id);
    }

    // Twelve claimers race for six items.
    let barrier = Arc::new(Barrier::new(12));
    let mut claimers = Vec::new();
    for _ in 0..12 {
        let queue = Arc::clone(&queue);
        let barrier = Arc::clone(&barrier);
        claimers.push(thread::spawn(move || {
            barrier.wait();
            queue.dequeue_begin().unwrap()
        }));
    }
    let results: Vec<Option<Job>> = claimers.into_iter().map(|c| c.join().unwrap()).collect();

    let claimed: Vec<&Job> = results.iter().flatten().collect();
    let distinct: HashSet<ItemId> = claimed.iter().map(|job| job.id).collect();
    assert_eq!(claimed.len(), 6);
    assert_eq!(distinct.len(), 6, "an item was handed to two claimers");
    assert!(distinct.iter().all(|id| enqueued.contains(id)));
    assert_eq!(results.iter().filter(|r| r.is_none()).count(), 6);

    // Every lease is now held; nothing is left to claim.
    assert!(queue.dequeue_begin().unwrap().is_none());
}

#[test]
fn test_claimed_item_stays_claimed_until_resolved() {
    let (_store, queue) = queue_with_staleness(HOUR);
    let mut job = Job::new("exclusive");
    queue.enqueue(&mut job).unwrap();

    let claimed = queue.dequeue_begin().unwrap().unwrap();
    // The lease never expires in this test, so nobody else gets the item.
    assert!(queue.dequeue_begin().unwrap().is_none());

    queue.dequeue_complete(&claimed).unwrap();
    assert!(queue.dequeue_begin().unwrap().is_none());
}

// --- Lease expiry and reclamation ---

#[test]
fn test_stalled_claim_is_reclaimed_for_another_consumer() {
    let (_store, queue) = queue_with_staleness(Duration::from_millis(100));
    let mut job = Job::new("fragile");
    queue.enqueue(&mut job).unwrap();

    let claimed = queue.dequeue_begin().unwrap().unwrap();
    assert!(queue.dequeue_begin().unwrap().is_none());

    // The claim is never completed. Once it outlives the staleness
    // threshold, the sweeper hands the item back.
    let reclaimed = wait_for_claim(&queue, Duration::from_secs(3));
    assert_eq!(reclaimed.id, claimed.id);
    assert_eq!(reclaimed.payload, "fragile");
}

#[test]
fn test_reclaimed_item_looks_freshly_enqueued() {
    let (store, queue) = queue_with_staleness(HOUR);

    // Plant a lease that expired an hour ago.
    let stalled = Job {
        id: ItemId::generate(),
        state: QueueState::Processing,
        changed: Timestamp::now().minus(Duration::from_secs(7200)),
        payload: "stalled".to_string(),
    };
    store.insert(&stalled).unwrap();

    assert_eq!(queue.reclaim_stale().unwrap(), 1);

    let stored = store.find_one(&ItemFilter::id(stalled.id)).unwrap().unwrap();
    assert_eq!(stored.state, QueueState::Waiting);
    assert!(stored.changed > stalled.changed);
}

// --- Shared store, multiple queue instances ---

#[test]
fn test_two_queue_instances_coordinate_through_one_store() {
    let store: Arc<MemoryStore<Job>> = Arc::new(MemoryStore::new());
    let config = QueueConfig::new("app", "jobs", HOUR);
    let producer =
        PersistedQueue::new(store.clone() as Arc<dyn AtomicStore<Job>>, config.clone()).unwrap();
    let consumer =
        PersistedQueue::new(store.clone() as Arc<dyn AtomicStore<Job>>, config).unwrap();

    let mut job = Job::new("shared");
    producer.enqueue(&mut job).unwrap();

    // The uniqueness constraint holds across instances.
    let mut clash = Job::new("imposter");
    clash.id = job.id;
    assert!(matches!(
        consumer.enqueue(&mut clash),
        Err(DocketError::DuplicateId(_))
    ));

    let claimed = consumer.dequeue_begin().unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    producer.dequeue_complete(&claimed).unwrap();
    assert!(store.is_empty());
}

// --- Full lifecycle ---

#[test]
fn test_item_lifecycle_end_to_end() {
    let (store, queue) = queue_with_staleness(HOUR);

    let mut job = Job::new("lifecycle");
    queue.enqueue(&mut job).unwrap();
    let stored = store.find_one(&ItemFilter::id(job.id)).unwrap().unwrap();
    assert_eq!(stored.state, QueueState::Waiting);

    let claimed = queue.dequeue_begin().unwrap().unwrap();
    // Returned copy predates the claim; the store shows the claim applied.
    assert_eq!(claimed.state, QueueState::Waiting);
    let stored = store.find_one(&ItemFilter::id(job.id)).unwrap().unwrap();
    assert_eq!(stored.state, QueueState::Processing);

    queue.dequeue_complete(&claimed).unwrap();
    assert!(store.is_empty());
    assert!(queue.dequeue_begin().unwrap().is_none());

    // The item is gone for good; completing again is a conflict.
    assert!(matches!(
        queue.dequeue_complete(&claimed),
        Err(DocketError::CompletionFailed(id)) if id == claimed.id
    ));
}
