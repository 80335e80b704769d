//! # dispatchd: single-node job broker
//!
//! `dispatchd` mediates between producers (who submit work) and workers
//! (who execute it): at-least-once delivery, exactly-once job creation,
//! bounded retry with dead-lettering. The hard part is the in-memory job
//! state machine and the concurrency protocol that glues leasing,
//! fencing, idempotent enqueue, retry scheduling, lease expiration, and
//! long-poll wake-up into one race-free whole.
//!
//! ```rust
//! use std::time::Duration;
//! use dispatchd::{Broker, BrokerConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let broker = Broker::new(BrokerConfig::default());
//! let job_id = broker.enqueue(b"hello".to_vec(), None).unwrap();
//!
//! let leased = broker.poll("w1", Duration::from_secs(1)).await.unwrap();
//! assert_eq!(leased.id, job_id);
//!
//! broker.ack("w1", &leased.id, leased.lease_id).unwrap();
//! # }
//! ```

pub mod broker;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod idempotency;
pub mod jitter;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod sweeper;
pub mod types;

pub use broker::Broker;
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::BrokerConfig;
pub use error::{BrokerError, BrokerResult};
pub use idempotency::{IdempotencyRegistry, Reservation};
pub use jitter::{JitterSource, SeededJitter, ThreadRngJitter};
pub use scheduler::Scheduler;
pub use store::JobStore;
pub use sweeper::LeaseSweeper;
pub use types::{JobId, JobRecord, JobState};
