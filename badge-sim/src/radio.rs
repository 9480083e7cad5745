//! In-memory radio: every badge hears every broadcast, unicast reaches one badge,
//! and each delivery may be lost independently.

use badge_core::{Contacts, Controller, PeerId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct Air {
    drop_rate: f64,
    rng: StdRng,
    delivered: u64,
    lost: u64,
}

impl Air {
    pub fn new(drop_rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            drop_rate: drop_rate.clamp(0.0, 1.0),
            rng,
            delivered: 0,
            lost: 0,
        }
    }

    /// Put one frame on the air. The sender never hears itself.
    pub fn transmit<C: Contacts>(
        &mut self,
        from: PeerId,
        dest: PeerId,
        bytes: &[u8],
        nodes: &mut [Controller<C>],
        now: u64,
    ) {
        for node in nodes.iter_mut() {
            let id = node.id();
            if id == from || !(dest.is_broadcast() || dest == id) {
                continue;
            }
            if self.rng.gen_bool(self.drop_rate) {
                self.lost += 1;
                tracing::trace!(%from, to = %id, "frame lost");
                continue;
            }
            self.delivered += 1;
            node.enqueue(from, bytes.to_vec(), now);
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }
}
