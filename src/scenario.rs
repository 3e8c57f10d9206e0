//! Declarative call orders for the [`Harness`](crate::harness::Harness).
//!
//! A scenario is the external driver's choice of who sends what and in which
//! order each copy arrives. The same scenario can be replayed against every
//! delivery algorithm.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Send {
        from: usize,
        label: String,
        payload: String,
    },
    Receive {
        to: usize,
        label: String,
    },
}

impl Step {
    pub fn send(from: usize, label: &str, payload: &str) -> Self {
        Step::Send {
            from,
            label: label.to_owned(),
            payload: payload.to_owned(),
        }
    }

    pub fn receive(to: usize, label: &str) -> Self {
        Step::Receive {
            to,
            label: label.to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub processes: usize,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// P0 sends "First" to P1, which then sends "Second". P2 gets "Second"
    /// before "First" and has to hold it back.
    pub fn first_second() -> Self {
        Self {
            processes: 3,
            steps: vec![
                Step::send(0, "first", "First"),
                Step::receive(1, "first"),
                Step::send(1, "second", "Second"),
                Step::receive(2, "second"),
                Step::receive(2, "first"),
            ],
        }
    }

    /// Three concurrent sends, one per process, arriving in scrambled order.
    /// Nothing is causally related, so nothing waits.
    pub fn three_senders() -> Self {
        Self {
            processes: 3,
            steps: vec![
                Step::send(0, "a", "Message A from P0"),
                Step::send(1, "b", "Message B from P1"),
                Step::send(2, "c", "Message C from P2"),
                Step::receive(1, "a"),
                Step::receive(1, "c"),
                Step::receive(2, "b"),
                Step::receive(2, "a"),
                Step::receive(0, "c"),
                Step::receive(0, "b"),
            ],
        }
    }

    /// Broadcast workload: `sends` messages from random processes, each copy
    /// delivered to every other process at a random later point. Receives and
    /// sends interleave, so later messages causally depend on earlier ones.
    pub fn random(processes: usize, sends: usize, seed: u64) -> Self {
        let sends = if processes == 0 { 0 } else { sends };
        let mut rng = StdRng::seed_from_u64(seed);
        let mut steps = Vec::new();
        let mut in_flight: Vec<(usize, String)> = Vec::new();
        let mut sent = 0;

        while sent < sends || !in_flight.is_empty() {
            let do_send = sent < sends && (in_flight.is_empty() || rng.gen_bool(0.35));
            if do_send {
                let from = rng.gen_range(0..processes);
                let label = format!("m{sent}");
                steps.push(Step::send(from, &label, &format!("P{from} says {sent}")));
                in_flight.extend(
                    (0..processes)
                        .filter(|&to| to != from)
                        .map(|to| (to, label.clone())),
                );
                sent += 1;
            } else {
                let (to, label) = in_flight.swap_remove(rng.gen_range(0..in_flight.len()));
                steps.push(Step::Receive { to, label });
            }
        }
        Self { processes, steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json() {
        let s = Scenario::from_json(
            r#"{
                "processes": 2,
                "steps": [
                    {"op": "send", "from": 0, "label": "x", "payload": "hi"},
                    {"op": "receive", "to": 1, "label": "x"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(s.processes, 2);
        assert_eq!(s.steps, vec![Step::send(0, "x", "hi"), Step::receive(1, "x")]);
    }

    #[test]
    fn random_is_seeded() {
        assert_eq!(Scenario::random(4, 10, 7), Scenario::random(4, 10, 7));
    }

    #[test]
    fn random_delivers_every_copy() {
        let s = Scenario::random(4, 10, 99);
        let sends = s
            .steps
            .iter()
            .filter(|st| matches!(st, Step::Send { .. }))
            .count();
        let receives = s.steps.len() - sends;
        assert_eq!(sends, 10);
        assert_eq!(receives, 10 * 3);
    }
}
