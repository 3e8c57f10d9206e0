//! Causal message delivery for simulated processes.
//!
//! Three delivery engines share one [`Process`](order::Process) shape and
//! differ only in the causal metadata they attach to an envelope:
//!
//! - [`VectorClock`](order::VectorClock): Birman-Schiper-Stephenson, one
//!   counter per process.
//! - [`DependencyClock`](order::DependencyClock): explicit set of messages the
//!   sender had delivered.
//! - [`MatrixClock`](order::MatrixClock): the sender's knowledge of every
//!   process's vector clock.
//!
//! A message whose predecessors have not all been delivered is buffered and
//! released by the cascade that follows each delivery. Nothing here does I/O:
//! the order in which a driver calls `receive` is the network.

pub mod error;
pub mod harness;
pub mod order;
pub mod scenario;

pub use error::{CausalError, EnvelopeDefect};
pub use harness::{CausalViolation, Harness, TraceEvent, TraceKind};
pub use order::{
    BssProcess, CausalClock, Delivery, DependencyClock, Envelope, MatrixClock, MatrixProcess,
    MessageId, Process, SesProcess, VectorClock,
};
pub use scenario::{Scenario, Step};
