use super::{pairwise_max, render_row, CausalClock, Envelope, MessageId, Process};
use crate::error::EnvelopeDefect;
use std::fmt;

pub type MatrixProcess = Process<MatrixClock>;

/// Row `j` is what this process knows of process `j`'s vector clock. The
/// own row is this process's vector clock: own sends on the diagonal,
/// deliveries per sender elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixClock {
    i: usize,
    m: Vec<Vec<usize>>,
}

impl MatrixClock {
    pub fn row(&self, j: usize) -> &[usize] {
        &self.m[j]
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.m
    }

    /// Row-wise maximum with another matrix of the same shape.
    /// Merging a matrix into itself changes nothing.
    pub fn merge_matrix(&mut self, other: &[Vec<usize>]) {
        for (row, theirs) in self.m.iter_mut().zip(other) {
            *row = pairwise_max(row.iter(), theirs.iter()).collect();
        }
    }

    /// How many of `k`'s messages every process is known to have delivered.
    /// Buffers keyed on those messages can be discarded everywhere.
    pub fn stable(&self, k: usize) -> usize {
        self.m.iter().map(|row| row[k]).min().unwrap_or(0)
    }
}

impl CausalClock for MatrixClock {
    type Meta = Vec<Vec<usize>>;

    fn new(i: usize, n_procs: usize) -> Self {
        assert!(
            i < n_procs,
            "Expect 0-based index of process {i} < n_procs={n_procs}"
        );
        Self {
            i,
            m: vec![vec![0; n_procs]; n_procs],
        }
    }
    fn stamp(&mut self) -> (MessageId, Vec<Vec<usize>>) {
        self.m[self.i][self.i] += 1;
        (MessageId::new(self.i, self.m[self.i][self.i]), self.m.clone())
    }
    fn check(&self, e: &Envelope<Vec<Vec<usize>>>) -> Result<(), EnvelopeDefect> {
        let n = self.m.len();
        let mm = e.meta();
        if mm.len() != n {
            return Err(EnvelopeDefect::DimensionMismatch {
                expected: n,
                found: mm.len(),
            });
        }
        if let Some(row) = mm.iter().find(|row| row.len() != n) {
            return Err(EnvelopeDefect::DimensionMismatch {
                expected: n,
                found: row.len(),
            });
        }
        let s = e.sender();
        if mm[s][s] != e.id().seq {
            return Err(EnvelopeDefect::SequenceMismatch {
                expected: e.id().seq,
                found: mm[s][s],
            });
        }
        Ok(())
    }
    fn is_delivered(&self, id: MessageId) -> bool {
        id.seq <= self.m[self.i][id.sender]
    }
    // Sender's own row must be one step ahead on the diagonal, and everything
    // else in that row already delivered here (own row)
    fn can_deliver(&self, e: &Envelope<Vec<Vec<usize>>>) -> bool {
        let s = e.sender();
        let sent = &e.meta()[s];
        sent[s] == self.m[s][s] + 1
            && sent
                .iter()
                .zip(&self.m[self.i])
                .enumerate()
                .all(|(k, (m, r))| k == s || m <= r)
    }
    fn merge(&mut self, e: &Envelope<Vec<Vec<usize>>>) {
        let s = e.sender();
        let mm = e.meta();
        self.merge_matrix(mm);
        self.m[s] = mm[s].clone();
        let own = pairwise_max(self.m[self.i].iter(), mm[s].iter()).collect();
        self.m[self.i] = own;
    }
}

// "[(1,0,0) (1,1,0) (0,0,0)]"
impl fmt::Display for MatrixClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self.m.iter().map(|row| render_row(row)).collect();
        write!(f, "[{}]", rows.join(" "))
    }
}
