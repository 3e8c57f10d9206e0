//! Simulation harness: owns the processes of one run, executes the call order
//! chosen by the driver, records a trace, and checks the outcome against the
//! causal order it observed.
//!
//! The harness tracks the causal past of every message on its own, from the
//! sends and deliveries it performs. That history does not depend on the
//! algorithm under test, so it can act as the oracle for all of them.

use crate::error::{CausalError, Result};
use crate::order::{CausalClock, Delivery, Envelope, MessageId, Process};
use crate::scenario::{Scenario, Step};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceKind {
    Sent,
    Delivered,
    Buffered,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    pub pid: usize,
    pub kind: TraceKind,
    pub msg: MessageId,
    pub payload: String,
}

impl TraceEvent {
    fn new<M>(pid: usize, kind: TraceKind, e: &Envelope<M>) -> Self {
        Self {
            pid,
            kind,
            msg: e.id(),
            payload: e.payload().to_owned(),
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            TraceKind::Sent => "sent",
            TraceKind::Delivered => "delivered",
            TraceKind::Buffered => "buffered",
        };
        write!(f, "P{} {verb} {} {:?}", self.pid, self.msg, self.payload)
    }
}

/// `pid` delivered `delivered` without having delivered `missing` first,
/// although `missing` causally precedes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CausalViolation {
    pub pid: usize,
    pub missing: MessageId,
    pub delivered: MessageId,
}

impl fmt::Display for CausalViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{} delivered {} before its predecessor {}",
            self.pid, self.delivered, self.missing
        )
    }
}

pub struct Harness<C: CausalClock> {
    procs: Vec<Process<C>>,
    // labels in send order
    order: Vec<String>,
    sent: HashMap<String, Envelope<C::Meta>>,
    labels: HashMap<MessageId, String>,
    pasts: HashMap<MessageId, BTreeSet<MessageId>>,
    histories: Vec<BTreeSet<MessageId>>,
    trace: Rc<RefCell<Vec<TraceEvent>>>,
}

impl<C: CausalClock> Harness<C> {
    pub fn new(n_procs: usize) -> Result<Self> {
        if n_procs == 0 {
            return Err(CausalError::InvalidProcess { id: 0, n: 0 });
        }
        let trace = Rc::new(RefCell::new(Vec::new()));
        let procs = (0..n_procs)
            .map(|i| -> Result<Process<C>> {
                let mut p = Process::new(i, n_procs)?;
                p.on_deliver({
                    let trace = trace.clone();
                    move |pid, e| {
                        trace
                            .borrow_mut()
                            .push(TraceEvent::new(pid, TraceKind::Delivered, e))
                    }
                });
                p.on_buffer({
                    let trace = trace.clone();
                    move |pid, e| {
                        trace
                            .borrow_mut()
                            .push(TraceEvent::new(pid, TraceKind::Buffered, e))
                    }
                });
                Ok(p)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            procs,
            order: Vec::new(),
            sent: HashMap::new(),
            labels: HashMap::new(),
            pasts: HashMap::new(),
            histories: vec![BTreeSet::new(); n_procs],
            trace,
        })
    }

    pub fn processes(&self) -> &[Process<C>] {
        &self.procs
    }

    pub fn process_mut(&mut self, pid: usize) -> Option<&mut Process<C>> {
        self.procs.get_mut(pid)
    }

    pub fn label(&self, id: MessageId) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }

    pub fn send(&mut self, from: usize, label: &str, payload: &str) -> Result<MessageId> {
        let n = self.procs.len();
        if self.sent.contains_key(label) {
            return Err(CausalError::DuplicateLabel(label.to_owned()));
        }
        let p = self
            .procs
            .get_mut(from)
            .ok_or(CausalError::InvalidProcess { id: from, n })?;
        let e = p.send(payload);
        let id = e.id();
        info!(from, msg = %id, label, "send");

        self.trace
            .borrow_mut()
            .push(TraceEvent::new(from, TraceKind::Sent, &e));
        self.pasts.insert(id, self.histories[from].clone());
        self.histories[from].insert(id);
        self.labels.insert(id, label.to_owned());
        self.order.push(label.to_owned());
        self.sent.insert(label.to_owned(), e);
        Ok(id)
    }

    pub fn receive(&mut self, to: usize, label: &str) -> Result<Delivery> {
        let n = self.procs.len();
        let e = self
            .sent
            .get(label)
            .ok_or_else(|| CausalError::UnknownLabel(label.to_owned()))?;
        let p = self
            .procs
            .get_mut(to)
            .ok_or(CausalError::InvalidProcess { id: to, n })?;

        let before = p.delivered().len();
        let outcome = p.receive(e)?;
        for id in &p.delivered()[before..] {
            if let Some(past) = self.pasts.get(id) {
                self.histories[to].extend(past.iter().copied());
            }
            self.histories[to].insert(*id);
        }
        info!(to, msg = %e.id(), label, ?outcome, "receive");
        Ok(outcome)
    }

    pub fn run(&mut self, scenario: &Scenario) -> Result<()> {
        for step in &scenario.steps {
            match step {
                Step::Send {
                    from,
                    label,
                    payload,
                } => {
                    self.send(*from, label, payload)?;
                }
                Step::Receive { to, label } => {
                    self.receive(*to, label)?;
                }
            }
        }
        Ok(())
    }

    /// Hands every sent message, in send order, to each process that has not
    /// seen it yet. Returns the number of receives performed.
    pub fn broadcast_all_pending(&mut self) -> Result<usize> {
        let mut count = 0;
        for label in self.order.clone() {
            let id = self.sent[&label].id();
            for to in 0..self.procs.len() {
                if to != id.sender && !self.procs[to].has_seen(id) {
                    self.receive(to, &label)?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.borrow().clone()
    }

    pub fn delivery_logs(&self) -> Vec<Vec<MessageId>> {
        self.procs.iter().map(|p| p.delivered().to_vec()).collect()
    }

    /// Every `(pid, a, b)` such that `pid` delivered `a` before `b`.
    pub fn delivered_before(&self) -> BTreeSet<(usize, MessageId, MessageId)> {
        let mut pairs = BTreeSet::new();
        for p in &self.procs {
            let log = p.delivered();
            for (k, a) in log.iter().enumerate() {
                for b in &log[k + 1..] {
                    pairs.insert((p.pid(), *a, *b));
                }
            }
        }
        pairs
    }

    /// Processes with a non-empty buffer and the ids they are holding.
    pub fn stuck(&self) -> Vec<(usize, Vec<MessageId>)> {
        self.procs
            .iter()
            .filter(|p| p.buffered_len() > 0)
            .map(|p| (p.pid(), p.buffered().map(|e| e.id()).collect()))
            .collect()
    }

    pub fn violations(&self) -> Vec<CausalViolation> {
        let mut found = Vec::new();
        for p in &self.procs {
            let pos: HashMap<MessageId, usize> = p
                .delivered()
                .iter()
                .enumerate()
                .map(|(k, id)| (*id, k))
                .collect();
            for (j, m2) in p.delivered().iter().enumerate() {
                let Some(past) = self.pasts.get(m2) else {
                    continue;
                };
                for m1 in past {
                    // own sends never show up in the delivery log
                    if m1.sender == p.pid() {
                        continue;
                    }
                    if !matches!(pos.get(m1), Some(&k) if k < j) {
                        found.push(CausalViolation {
                            pid: p.pid(),
                            missing: *m1,
                            delivered: *m2,
                        });
                    }
                }
            }
        }
        found
    }
}
