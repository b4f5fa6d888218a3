//! # Sync Engine
//!
//! The node's entire shared-state surface:
//!
//! - `SharedReadingStore`: latest reading per sensor kind, closure-scoped lock
//! - `ReadinessBarrier`: N producers signal, the Dispatcher waits for a full round
//! - `HandoffQueue`: bounded FIFO from one producer to the actuator task
//!
//! ## Usage
//!
//! ```ignore
//! use sync_engine::{BarrierWait, ReadinessBarrier, SharedReadingStore};
//!
//! let store = SharedReadingStore::new();
//! let barrier = ReadinessBarrier::new(&SensorKind::ALL);
//!
//! // producer
//! store.write(SensorKind::Gas, slot);
//! barrier.signal(SensorKind::Gas);
//!
//! // dispatcher
//! if barrier.await_full(Some(timeout)).await == BarrierWait::Ready {
//!     let snapshot = store.snapshot();
//!     // ... send outside the lock ...
//! }
//! barrier.rearm();
//! ```

mod barrier;
mod handoff;
mod store;

pub use barrier::{BarrierWait, ReadinessBarrier, SignalOutcome};
pub use handoff::{HandoffQueue, PushOutcome, QueueStats};
pub use store::SharedReadingStore;
