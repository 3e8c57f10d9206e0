use super::{CausalClock, Delivery, Envelope, MessageId};
use crate::error::{CausalError, EnvelopeDefect, Result};
use tracing::{debug, trace, warn};

type EnvelopeHook<M> = Box<dyn FnMut(usize, &Envelope<M>)>;
type ClockHook = Box<dyn FnMut(usize, &str)>;

/// A simulated process: identity, clock state, the buffer of messages whose
/// causal predecessors are still missing, and the observer hooks.
///
/// The buffer keeps insertion order. After every delivery it is rescanned
/// from the front, the first eligible entry is delivered, and the scan
/// restarts until a full pass finds nothing.
pub struct Process<C: CausalClock> {
    i: usize,
    n: usize,
    clock: C,
    buffer: Vec<Envelope<C::Meta>>,
    delivered: Vec<MessageId>,
    deliver_hooks: Vec<EnvelopeHook<C::Meta>>,
    buffer_hooks: Vec<EnvelopeHook<C::Meta>>,
    clock_hooks: Vec<ClockHook>,
}

impl<C: CausalClock> Process<C> {
    pub fn new(i: usize, n_procs: usize) -> Result<Self> {
        if i >= n_procs {
            return Err(CausalError::InvalidProcess { id: i, n: n_procs });
        }
        Ok(Self {
            i,
            n: n_procs,
            clock: C::new(i, n_procs),
            buffer: Vec::new(),
            delivered: Vec::new(),
            deliver_hooks: Vec::new(),
            buffer_hooks: Vec::new(),
            clock_hooks: Vec::new(),
        })
    }

    pub fn pid(&self) -> usize {
        self.i
    }

    pub fn n_procs(&self) -> usize {
        self.n
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // Snapshot of the clock state, detached from the process
    pub fn snapshot(&self) -> C {
        self.clock.clone()
    }

    /// Ids of delivered messages, in delivery order.
    pub fn delivered(&self) -> &[MessageId] {
        &self.delivered
    }

    pub fn buffered(&self) -> impl Iterator<Item = &Envelope<C::Meta>> {
        self.buffer.iter()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether `id` was delivered here, sent from here, or is in the buffer.
    pub fn has_seen(&self, id: MessageId) -> bool {
        self.clock.is_delivered(id) || self.buffer.iter().any(|e| e.id() == id)
    }

    pub fn on_deliver<F>(&mut self, f: F)
    where
        F: FnMut(usize, &Envelope<C::Meta>) + 'static,
    {
        self.deliver_hooks.push(Box::new(f));
    }

    pub fn on_buffer<F>(&mut self, f: F)
    where
        F: FnMut(usize, &Envelope<C::Meta>) + 'static,
    {
        self.buffer_hooks.push(Box::new(f));
    }

    /// Called with the rendered clock after every send and delivery.
    pub fn on_clock_update<F>(&mut self, f: F)
    where
        F: FnMut(usize, &str) + 'static,
    {
        self.clock_hooks.push(Box::new(f));
    }

    pub fn send(&mut self, payload: impl Into<String>) -> Envelope<C::Meta> {
        let (id, meta) = self.clock.stamp();
        let e = Envelope::new(id, payload, meta);
        debug!(pid = self.i, msg = %id, clock = %self.clock, "sent");
        self.notify_clock();
        e
    }

    /// Delivers `e` if its causal predecessors are all delivered here,
    /// otherwise buffers it. A malformed envelope leaves the process untouched.
    pub fn receive(&mut self, e: &Envelope<C::Meta>) -> Result<Delivery> {
        self.check(e)?;
        if self.has_seen(e.id()) {
            warn!(pid = self.i, msg = %e.id(), "dropping duplicate");
            return Ok(Delivery::Duplicate);
        }
        if !self.clock.can_deliver(e) {
            self.buffer.push(e.clone());
            debug!(
                pid = self.i,
                msg = %e.id(),
                clock = %self.clock,
                buffered = self.buffer.len(),
                "buffered"
            );
            for hook in &mut self.buffer_hooks {
                hook(self.i, e);
            }
            return Ok(Delivery::Buffered);
        }
        self.deliver(e);
        self.cascade();
        Ok(Delivery::Delivered)
    }

    fn check(&self, e: &Envelope<C::Meta>) -> Result<()> {
        let defect = if e.sender() >= self.n {
            Some(EnvelopeDefect::SenderOutOfRange {
                sender: e.sender(),
                n: self.n,
            })
        } else if e.id().seq == 0 {
            Some(EnvelopeDefect::ZeroSequence)
        } else {
            self.clock.check(e).err()
        };
        match defect {
            Some(defect) => Err(CausalError::InvalidEnvelope { id: e.id(), defect }),
            None => Ok(()),
        }
    }

    fn deliver(&mut self, e: &Envelope<C::Meta>) {
        self.clock.merge(e);
        self.delivered.push(e.id());
        debug!(pid = self.i, msg = %e.id(), clock = %self.clock, "delivered");
        for hook in &mut self.deliver_hooks {
            hook(self.i, e);
        }
        self.notify_clock();
    }

    fn cascade(&mut self) {
        let mut round = 0;
        while let Some(pos) = self.buffer.iter().position(|e| self.clock.can_deliver(e)) {
            let e = self.buffer.remove(pos);
            round += 1;
            trace!(pid = self.i, round, msg = %e.id(), "released from buffer");
            self.deliver(&e);
        }
    }

    fn notify_clock(&mut self) {
        if self.clock_hooks.is_empty() {
            return;
        }
        let rendered = self.clock.to_string();
        for hook in &mut self.clock_hooks {
            hook(self.i, &rendered);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{CausalError, EnvelopeDefect};
    use crate::order::{BssProcess, Delivery, Envelope, MessageId};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn rejects_bad_identity() {
        assert!(matches!(
            BssProcess::new(3, 3),
            Err(CausalError::InvalidProcess { id: 3, n: 3 })
        ));
        assert!(BssProcess::new(0, 0).is_err());
        assert!(BssProcess::new(2, 3).is_ok());
    }

    #[test]
    fn hooks_fire_in_delivery_order() {
        let mut ps: Vec<_> = (0..2).map(|i| BssProcess::new(i, 2).unwrap()).collect();
        let log = Rc::new(RefCell::new(Vec::new()));
        ps[1].on_deliver({
            let log = log.clone();
            move |pid, e| log.borrow_mut().push(format!("{pid} got {}", e.payload()))
        });
        ps[1].on_buffer({
            let log = log.clone();
            move |pid, e| log.borrow_mut().push(format!("{pid} held {}", e.payload()))
        });

        let a = ps[0].send("a");
        let b = ps[0].send("b");
        let c = ps[0].send("c");
        assert_eq!(ps[1].receive(&c).unwrap(), Delivery::Buffered);
        assert_eq!(ps[1].receive(&b).unwrap(), Delivery::Buffered);
        assert_eq!(ps[1].receive(&a).unwrap(), Delivery::Delivered);

        assert_eq!(
            *log.borrow(),
            vec!["1 held c", "1 held b", "1 got a", "1 got b", "1 got c"]
        );
        assert_eq!(ps[1].buffered_len(), 0);
    }

    #[test]
    fn clock_hook_sees_each_change() {
        let mut p = BssProcess::new(0, 2).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        p.on_clock_update({
            let seen = seen.clone();
            move |_, clk| seen.borrow_mut().push(clk.to_owned())
        });
        p.send("x");
        p.send("y");
        assert_eq!(*seen.borrow(), vec!["(1,0)", "(2,0)"]);
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut ps: Vec<_> = (0..2).map(|i| BssProcess::new(i, 2).unwrap()).collect();
        let calls = Rc::new(RefCell::new(0));
        ps[1].on_deliver({
            let calls = calls.clone();
            move |_, _| *calls.borrow_mut() += 1
        });
        let a = ps[0].send("a");
        let b = ps[0].send("b");

        assert_eq!(ps[1].receive(&b).unwrap(), Delivery::Buffered);
        assert_eq!(ps[1].receive(&b).unwrap(), Delivery::Duplicate);
        assert_eq!(ps[1].buffered_len(), 1);
        assert_eq!(ps[1].receive(&a).unwrap(), Delivery::Delivered);
        assert_eq!(ps[1].receive(&a).unwrap(), Delivery::Duplicate);
        assert_eq!(*calls.borrow(), 2);
        assert_eq!(ps[1].delivered(), &[MessageId::new(0, 1), MessageId::new(0, 2)]);

        // own message coming back
        assert_eq!(ps[0].receive(&a).unwrap(), Delivery::Duplicate);
    }

    #[test]
    fn malformed_envelope_changes_nothing() {
        let mut p = BssProcess::new(0, 2).unwrap();
        let before = p.snapshot();

        let e = Envelope::new(MessageId::new(5, 1), "x", vec![0, 0]);
        assert_eq!(
            p.receive(&e),
            Err(CausalError::InvalidEnvelope {
                id: MessageId::new(5, 1),
                defect: EnvelopeDefect::SenderOutOfRange { sender: 5, n: 2 },
            })
        );
        let e = Envelope::new(MessageId::new(1, 0), "x", vec![0, 0]);
        assert!(matches!(
            p.receive(&e),
            Err(CausalError::InvalidEnvelope {
                defect: EnvelopeDefect::ZeroSequence,
                ..
            })
        ));
        assert_eq!(p.snapshot(), before);
        assert_eq!(p.buffered_len(), 0);
        assert!(p.delivered().is_empty());
    }
}
