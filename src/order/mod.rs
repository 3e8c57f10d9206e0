pub mod dependency;
pub mod matrix_clock;
pub mod process;
pub mod vector_clock;

use crate::error::EnvelopeDefect;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use dependency::{DependencyClock, SesProcess};
pub use matrix_clock::{MatrixClock, MatrixProcess};
pub use process::Process;
pub use vector_clock::{BssProcess, VectorClock};

/// Identifies a message by its sender and the sender's local send sequence,
/// starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId {
    pub sender: usize,
    pub seq: usize,
}

impl MessageId {
    pub fn new(sender: usize, seq: usize) -> Self {
        Self { sender, seq }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}#{}", self.sender, self.seq)
    }
}

/// Unit of transmission. Fields are read-only once built so an envelope can
/// be shared between receivers without synchronisation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<M> {
    id: MessageId,
    payload: String,
    meta: M,
}

impl<M> Envelope<M> {
    pub fn new(id: MessageId, payload: impl Into<String>, meta: M) -> Self {
        Self {
            id,
            payload: payload.into(),
            meta,
        }
    }
    pub fn id(&self) -> MessageId {
        self.id
    }
    pub fn sender(&self) -> usize {
        self.id.sender
    }
    pub fn payload(&self) -> &str {
        &self.payload
    }
    pub fn meta(&self) -> &M {
        &self.meta
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Buffered,
    /// Already delivered or already waiting in the buffer; nothing changed.
    Duplicate,
}

/// Per-algorithm clock state and delivery rule.
///
/// [`Process`] drives the shared part (validation, buffering, cascade, hooks)
/// and calls into the clock for everything algorithm specific.
// Display because clock state is rendered for logs and hooks
pub trait CausalClock: Clone + fmt::Display {
    type Meta: Clone + fmt::Debug + 'static;

    fn new(i: usize, n_procs: usize) -> Self;
    // Bumps own send counter and snapshots the metadata for the outgoing message
    fn stamp(&mut self) -> (MessageId, Self::Meta);
    // Sender range and zero sequence are checked by the caller
    fn check(&self, e: &Envelope<Self::Meta>) -> Result<(), EnvelopeDefect>;
    fn is_delivered(&self, id: MessageId) -> bool;
    fn can_deliver(&self, e: &Envelope<Self::Meta>) -> bool;
    fn merge(&mut self, e: &Envelope<Self::Meta>);
}

// Helper function
fn pairwise_max<'a, I>(a: I, b: I) -> impl Iterator<Item = usize> + 'a
where
    I: Iterator<Item = &'a usize> + 'a,
{
    a.zip(b).map(|(i, j)| *i.max(j))
}

// "(1,0,2)"
fn render_row(row: &[usize]) -> String {
    let parts: Vec<String> = row.iter().map(usize::to_string).collect();
    format!("({})", parts.join(","))
}
