use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use dispatchd::{Broker, BrokerConfig, FakeClock, JobState, SeededJitter};

fn broker_with_fake_clock() -> (Arc<Broker>, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let jitter = Arc::new(SeededJitter::new(7));
    let broker = Broker::with_clock_and_jitter(BrokerConfig::default(), clock.clone(), jitter);
    (broker, clock)
}

/// S1 - Happy path.
#[tokio::test]
async fn s1_happy_path() {
    let (broker, _clock) = broker_with_fake_clock();

    let job_id = broker.enqueue(b"hello".to_vec(), None).unwrap();

    let leased = broker.poll("w1", Duration::from_secs(1)).await.unwrap();
    assert_eq!(leased.id, job_id);
    assert_eq!(leased.state, JobState::Leased);
    assert_eq!(leased.lease_id, 1);
    assert_eq!(leased.lease_owner.as_deref(), Some("w1"));

    broker.ack("w1", &job_id, 1).unwrap();
    // Second ack is idempotent.
    broker.ack("w1", &job_id, 1).unwrap();

    let job = broker.get(&job_id).unwrap();
    assert_eq!(job.state, JobState::Done);
    assert_eq!(job.attempts, 0);
}

/// S2 - Zombie fencing: an expired lease's holder can never win a race
/// against the worker that picked the job up after the sweeper reclaimed it.
#[tokio::test]
async fn s2_zombie_fencing() {
    let (broker, clock) = broker_with_fake_clock();

    let job_id = broker.enqueue(b"x".to_vec(), None).unwrap();

    let leased1 = broker.poll("w1", Duration::from_secs(1)).await.unwrap();
    assert_eq!(leased1.lease_id, 1);

    // Lease duration is 30s; push well past it then sweep.
    clock.advance(chrono::Duration::seconds(35));
    let reclaimed = broker.sweeper().sweep_once();
    assert_eq!(reclaimed, 1);

    let leased2 = broker.poll("w2", Duration::from_secs(1)).await.unwrap();
    assert_eq!(leased2.id, job_id);
    assert_eq!(leased2.lease_id, 2);

    let stale = broker.ack("w1", &job_id, 1);
    assert!(matches!(stale, Err(dispatchd::BrokerError::Conflict(_))));

    broker.ack("w2", &job_id, 2).unwrap();

    let job = broker.get(&job_id).unwrap();
    assert_eq!(job.state, JobState::Done);
}

/// S3 - Backoff then dead-letter once the retry budget is exhausted.
#[tokio::test]
async fn s3_backoff_and_dead() {
    let (broker, clock) = broker_with_fake_clock();

    let job_id = broker.enqueue(b"p".to_vec(), None).unwrap();

    let leased = broker.poll("w1", Duration::from_secs(1)).await.unwrap();
    assert_eq!(leased.lease_id, 1);
    broker.fail("w1", &job_id, 1).unwrap();

    let after_first_fail = broker.get(&job_id).unwrap();
    assert_eq!(after_first_fail.state, JobState::Queued);
    assert_eq!(after_first_fail.attempts, 1);
    let window = after_first_fail.next_available_at.unwrap() - after_first_fail.created_at;
    assert!(window >= chrono::Duration::zero());
    assert!(window <= chrono::Duration::seconds(5));

    clock.advance(chrono::Duration::seconds(5));
    let leased = broker.poll("w1", Duration::from_secs(1)).await.unwrap();
    assert_eq!(leased.lease_id, 2);
    broker.fail("w1", &job_id, 2).unwrap();

    let after_second_fail = broker.get(&job_id).unwrap();
    assert_eq!(after_second_fail.attempts, 2);

    clock.advance(chrono::Duration::seconds(10));
    let leased = broker.poll("w1", Duration::from_secs(1)).await.unwrap();
    assert_eq!(leased.lease_id, 3);
    broker.fail("w1", &job_id, 3).unwrap();

    let dead = broker.get(&job_id).unwrap();
    assert_eq!(dead.state, JobState::Dead);
    assert_eq!(dead.attempts, 3);

    let no_job = broker.poll("w1", Duration::from_millis(50)).await;
    assert!(matches!(no_job, Err(dispatchd::BrokerError::NoJobAvailable)));

    let dead_jobs = broker.list_dead();
    assert_eq!(dead_jobs.len(), 1);
    assert_eq!(dead_jobs[0].id, job_id);
}

/// S4 - Idempotent enqueue: two requests, same key, serially, one job.
#[tokio::test]
async fn s4_idempotent_enqueue_serial() {
    let (broker, _clock) = broker_with_fake_clock();

    let first = broker
        .enqueue(b"a".to_vec(), Some("K".to_string()))
        .unwrap();
    let second = broker
        .enqueue(b"b".to_vec(), Some("K".to_string()))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(broker.list_all().len(), 1);
}

/// S5 - Concurrent duplicate enqueue: every successful result refers to the
/// same job id, and only one job record is ever created for the key.
#[test]
fn s5_concurrent_duplicate_enqueue() {
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let jitter = Arc::new(SeededJitter::new(3));
    let broker = Broker::with_clock_and_jitter(BrokerConfig::default(), clock, jitter);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let broker = broker.clone();
            std::thread::spawn(move || {
                broker.enqueue(format!("payload-{i}").into_bytes(), Some("dup-key".to_string()))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let ok_ids: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert!(!ok_ids.is_empty(), "at least one enqueue must succeed");
    let first = ok_ids[0];
    assert!(ok_ids.iter().all(|id| *id == first), "every successful result must name the same job id");

    for r in &results {
        match r {
            Ok(id) => assert_eq!(id, first),
            Err(dispatchd::BrokerError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(broker.list_all().len(), 1);
}

/// S6 - A blocked poll with no jobs wakes promptly once one is enqueued.
#[tokio::test]
async fn s6_long_poll_wakes_on_enqueue() {
    let (broker, _clock) = broker_with_fake_clock();

    let waiter = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.poll("w1", Duration::from_secs(5)).await })
    };

    // Give the poll a moment to register as a waiter before enqueuing.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let job_id = broker.enqueue(b"y".to_vec(), None).unwrap();

    let leased = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("poll did not wake up in time")
        .unwrap()
        .unwrap();

    assert_eq!(leased.id, job_id);
    assert_eq!(leased.lease_id, 1);
    assert_eq!(leased.lease_owner.as_deref(), Some("w1"));
}
