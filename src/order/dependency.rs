use super::{CausalClock, Envelope, MessageId, Process};
use crate::error::EnvelopeDefect;
use std::collections::BTreeSet;
use std::fmt;

/// Schiper-Eggli-Sandoz style delivery over explicit dependency sets.
pub type SesProcess = Process<DependencyClock>;

/// Own send counter plus every message delivered here, own sends included.
///
/// A message carries the delivered set of its sender at send time. Since
/// nothing enters that set before its own dependencies, the set already
/// covers the whole causal past of the message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyClock {
    i: usize,
    n: usize,
    seq: usize,
    delivered: BTreeSet<MessageId>,
}

impl DependencyClock {
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn delivered_set(&self) -> &BTreeSet<MessageId> {
        &self.delivered
    }
}

impl CausalClock for DependencyClock {
    type Meta = BTreeSet<MessageId>;

    fn new(i: usize, n_procs: usize) -> Self {
        assert!(
            i < n_procs,
            "Expect 0-based index of process {i} < n_procs={n_procs}"
        );
        Self {
            i,
            n: n_procs,
            seq: 0,
            delivered: BTreeSet::new(),
        }
    }
    fn stamp(&mut self) -> (MessageId, BTreeSet<MessageId>) {
        self.seq += 1;
        let id = MessageId::new(self.i, self.seq);
        let deps = self.delivered.clone();
        // Later sends from here depend on this one
        self.delivered.insert(id);
        (id, deps)
    }
    fn check(&self, e: &Envelope<BTreeSet<MessageId>>) -> Result<(), EnvelopeDefect> {
        for &dep in e.meta() {
            if dep.sender >= self.n {
                return Err(EnvelopeDefect::DependencyOutOfRange { dep, n: self.n });
            }
            if dep.seq == 0 {
                return Err(EnvelopeDefect::ZeroSequence);
            }
            if dep.sender == e.sender() && dep.seq >= e.id().seq {
                return Err(EnvelopeDefect::FutureDependency { dep });
            }
        }
        Ok(())
    }
    fn is_delivered(&self, id: MessageId) -> bool {
        self.delivered.contains(&id)
    }
    fn can_deliver(&self, e: &Envelope<BTreeSet<MessageId>>) -> bool {
        e.meta().is_subset(&self.delivered)
    }
    fn merge(&mut self, e: &Envelope<BTreeSet<MessageId>>) {
        self.delivered.insert(e.id());
    }
}

// "#2 {P0#1,P1#1,P1#2}"
impl fmt::Display for DependencyClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.delivered.iter().map(MessageId::to_string).collect();
        write!(f, "#{} {{{}}}", self.seq, ids.join(","))
    }
}
