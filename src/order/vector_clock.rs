use super::{render_row, CausalClock, Envelope, MessageId, Process};
use crate::error::EnvelopeDefect;
use std::cmp::Ordering;
use std::fmt;

/// Birman-Schiper-Stephenson delivery.
pub type BssProcess = Process<VectorClock>;

/// `clk[i]` counts own sends, `clk[j]` the highest sequence from `j` delivered here.
#[derive(Clone, Debug)]
pub struct VectorClock {
    i: usize,
    clk: Vec<usize>,
}

impl VectorClock {
    pub fn as_slice(&self) -> &[usize] {
        &self.clk
    }
}

impl CausalClock for VectorClock {
    type Meta = Vec<usize>;

    fn new(i: usize, n_procs: usize) -> Self {
        assert!(
            i < n_procs,
            "Expect 0-based index of process {i} < n_procs={n_procs}"
        );
        Self {
            i,
            clk: vec![0; n_procs],
        }
    }
    fn stamp(&mut self) -> (MessageId, Vec<usize>) {
        self.clk[self.i] += 1;
        (MessageId::new(self.i, self.clk[self.i]), self.clk.clone())
    }
    fn check(&self, e: &Envelope<Vec<usize>>) -> Result<(), EnvelopeDefect> {
        let v = e.meta();
        if v.len() != self.clk.len() {
            return Err(EnvelopeDefect::DimensionMismatch {
                expected: self.clk.len(),
                found: v.len(),
            });
        }
        if v[e.sender()] != e.id().seq {
            return Err(EnvelopeDefect::SequenceMismatch {
                expected: e.id().seq,
                found: v[e.sender()],
            });
        }
        Ok(())
    }
    fn is_delivered(&self, id: MessageId) -> bool {
        id.seq <= self.clk[id.sender]
    }
    // Next in line from the sender, and nothing the sender had seen is missing here
    fn can_deliver(&self, e: &Envelope<Vec<usize>>) -> bool {
        let s = e.sender();
        let v = e.meta();
        v[s] == self.clk[s] + 1
            && v
                .iter()
                .zip(&self.clk)
                .enumerate()
                .all(|(k, (m, c))| k == s || m <= c)
    }
    fn merge(&mut self, e: &Envelope<Vec<usize>>) {
        let s = e.sender();
        self.clk[s] = e.meta()[s];
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_row(&self.clk))
    }
}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.clk.len() != other.clk.len() {
            return None;
        }
        self.clk
            .iter()
            .zip(&other.clk)
            .try_fold(Ordering::Equal, |acc, (s, t)| match (acc, s.cmp(t)) {
                (acc, Ordering::Equal) => Some(acc),
                (Ordering::Equal, o) => Some(o),
                (acc, o) if acc == o => Some(acc),
                _ => None,
            })
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.clk == other.clk
    }
}

#[cfg(test)]
mod tests {
    use crate::order::{BssProcess, CausalClock, Delivery, VectorClock};
    use rand::seq::SliceRandom;
    use rand::Rng;
    use std::cmp::Ordering;

    #[test]
    fn partial_ord() {
        let mut e1 = VectorClock::new(0, 2);
        let e0 = e1.clone();
        assert_eq!(e0.partial_cmp(&e0), Some(Ordering::Equal));
        e1.stamp();
        assert_eq!(e0.partial_cmp(&e1), Some(Ordering::Less));
        assert_eq!(e1.partial_cmp(&e0), Some(Ordering::Greater));

        let mut f1 = VectorClock::new(1, 2);
        f1.stamp();
        assert_eq!(e1.partial_cmp(&f1), None);
        assert_eq!(f1.partial_cmp(&e1), None);
        assert_eq!(VectorClock::new(0, 3).partial_cmp(&e0), None);
    }

    #[test]
    fn first_then_second() {
        let mut ps: Vec<_> = (0..3).map(|i| BssProcess::new(i, 3).unwrap()).collect();

        let first = ps[0].send("First");
        assert_eq!(first.meta(), &vec![1, 0, 0]);
        assert_eq!(ps[1].receive(&first).unwrap(), Delivery::Delivered);
        assert_eq!(ps[1].clock().as_slice(), &[1, 0, 0]);

        let second = ps[1].send("Second");
        assert_eq!(second.meta(), &vec![1, 1, 0]);

        // P2 has not seen P0's message yet
        assert_eq!(ps[2].receive(&second).unwrap(), Delivery::Buffered);
        assert_eq!(ps[2].clock().to_string(), "(0,0,0)");

        assert_eq!(ps[2].receive(&first).unwrap(), Delivery::Delivered);
        assert_eq!(ps[2].clock().to_string(), "(1,1,0)");
        assert_eq!(ps[2].delivered(), &[first.id(), second.id()]);
        assert_eq!(ps[2].buffered_len(), 0);
    }

    #[test]
    fn concurrent_messages_need_no_wait() {
        let mut ps: Vec<_> = (0..3).map(|i| BssProcess::new(i, 3).unwrap()).collect();
        let a = ps[0].send("A");
        let c = ps[2].send("C");
        assert_eq!(ps[1].receive(&c).unwrap(), Delivery::Delivered);
        assert_eq!(ps[1].receive(&a).unwrap(), Delivery::Delivered);
        assert_eq!(ps[1].clock().as_slice(), &[1, 0, 1]);
    }

    #[test]
    fn self_order_under_shuffle() {
        let mut rng = rand::thread_rng();
        let n_msgs = rng.gen_range(1..=50);
        let mut src = BssProcess::new(0, 2).unwrap();
        let mut dst = BssProcess::new(1, 2).unwrap();

        let mut stamps = Vec::new();
        let mut es: Vec<_> = (0..n_msgs)
            .map(|k| {
                let e = src.send(format!("{k}"));
                stamps.push(src.snapshot());
                e
            })
            .collect();
        // Program order --> s<t
        assert!(stamps.iter().zip(&stamps[1..]).all(|(s, t)| s < t));

        es.shuffle(&mut rng);
        for e in &es {
            dst.receive(e).unwrap();
        }
        let seqs: Vec<_> = dst.delivered().iter().map(|id| id.seq).collect();
        assert_eq!(seqs, (1..=n_msgs).collect::<Vec<_>>());
    }

    #[test]
    fn envelope_checks() {
        use crate::error::EnvelopeDefect;
        use crate::order::{Envelope, MessageId};

        let p = VectorClock::new(0, 3);
        let short = Envelope::new(MessageId::new(1, 1), "", vec![0, 1]);
        assert_eq!(
            p.check(&short),
            Err(EnvelopeDefect::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
        let lying = Envelope::new(MessageId::new(1, 2), "", vec![0, 1, 0]);
        assert_eq!(
            p.check(&lying),
            Err(EnvelopeDefect::SequenceMismatch {
                expected: 2,
                found: 1
            })
        );
    }
}
