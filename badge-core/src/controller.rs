//! Top-level controller: owns the active role and the inbound queue, and is the one place
//! where malformed packets are logged and dropped.

use crate::client::ClientView;
use crate::config::GameConfig;
use crate::identity::{Contacts, Identity, PeerId};
use crate::protocol::Action;
use crate::queue::InboundQueue;
use crate::session::Session;

/// What this badge is doing. Switching roles drops the old state.
pub enum Role {
    Idle,
    Host(Session),
    Client(ClientView),
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Idle => "idle",
            Role::Host(_) => "host",
            Role::Client(_) => "client",
        }
    }
}

/// Drives one badge: the radio callback calls `enqueue`, the main loop calls `tick`.
pub struct Controller<C: Contacts> {
    contacts: C,
    config: GameConfig,
    role: Role,
    queue: InboundQueue,
}

impl<C: Contacts> Controller<C> {
    pub fn new(contacts: C, config: GameConfig) -> Self {
        let queue = InboundQueue::new(config.queue_capacity);
        Self {
            contacts,
            config,
            role: Role::Idle,
            queue,
        }
    }

    pub fn id(&self) -> PeerId {
        self.contacts.my_identity().id
    }

    pub fn contacts(&self) -> &C {
        &self.contacts
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn queue(&self) -> &InboundQueue {
        &self.queue
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.role {
            Role::Host(s) => Some(s),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        match &mut self.role {
            Role::Host(s) => Some(s),
            _ => None,
        }
    }

    pub fn client(&self) -> Option<&ClientView> {
        match &self.role {
            Role::Client(c) => Some(c),
            _ => None,
        }
    }

    pub fn client_mut(&mut self) -> Option<&mut ClientView> {
        match &mut self.role {
            Role::Client(c) => Some(c),
            _ => None,
        }
    }

    /// Host a new session. `seed` fixes the rule parameters.
    pub fn become_host(&mut self, seed: Option<u64>) -> Vec<Action> {
        let actions = self.teardown();
        let me = self.contacts.my_identity();
        let config = self.config.clone();
        let session = match seed {
            Some(seed) => Session::with_seed(me, config, seed),
            None => Session::new(me, config),
        };
        self.role = Role::Host(session);
        tracing::info!(id = %self.id(), "now hosting");
        actions
    }

    pub fn become_client(&mut self) -> Vec<Action> {
        let actions = self.teardown();
        let me = self.contacts.my_identity();
        self.role = Role::Client(ClientView::new(me, self.config.clone()));
        tracing::info!(id = %self.id(), "now a client");
        actions
    }

    pub fn stand_down(&mut self) -> Vec<Action> {
        self.teardown()
    }

    fn teardown(&mut self) -> Vec<Action> {
        let actions = match &mut self.role {
            Role::Client(c) => c.disconnect(),
            Role::Host(_) | Role::Idle => Vec::new(),
        };
        self.role = Role::Idle;
        self.queue.clear();
        actions
    }

    /// Radio receive callback.
    pub fn enqueue(&mut self, source: PeerId, bytes: Vec<u8>, now: u64) {
        self.queue.push(source, bytes, now);
    }

    /// Drain a bounded batch of packets, then advance timers.
    pub fn tick(&mut self, now: u64) -> Vec<Action> {
        let mut actions = Vec::new();
        for inbound in self.queue.pop_batch(self.config.max_packets_per_tick) {
            let result = match &mut self.role {
                Role::Host(s) => s.handle_inbound(inbound.source, &inbound.bytes, now),
                Role::Client(c) => c.handle_inbound(inbound.source, &inbound.bytes, now),
                Role::Idle => Ok(Vec::new()),
            };
            match result {
                Ok(out) => actions.extend(out),
                Err(e) => tracing::debug!(
                    source = %inbound.source,
                    len = inbound.bytes.len(),
                    error = %e,
                    "dropping malformed packet"
                ),
            }
        }
        match &mut self.role {
            Role::Host(s) => actions.extend(s.tick(now)),
            Role::Client(c) => actions.extend(c.tick(now)),
            Role::Idle => {}
        }
        self.remember_peers();
        actions
    }

    /// Copy newly met badges into the contact store.
    fn remember_peers(&mut self) {
        let met: Vec<Identity> = match &self.role {
            Role::Host(s) => s
                .peers()
                .iter()
                .map(|p| Identity::new(p.id, &p.name))
                .collect(),
            Role::Client(c) => c
                .known_peers()
                .iter()
                .map(|e| Identity::new(e.id, &e.name))
                .chain(c.discovered_hosts().map(|h| Identity::new(h.id, &h.name)))
                .collect(),
            Role::Idle => Vec::new(),
        };
        for identity in met {
            if self.contacts.lookup(identity.id).as_ref() != Some(&identity) {
                self.contacts.store(identity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientPhase;
    use crate::identity::MemoryContacts;
    use crate::session::Phase;

    const HOST: PeerId = PeerId(0x4a23);
    const A: PeerId = PeerId(0x492a);
    const B: PeerId = PeerId(0x5f23);
    const C: PeerId = PeerId(0x182a);

    struct World {
        nodes: Vec<Controller<MemoryContacts>>,
    }

    impl World {
        fn new() -> Self {
            let mut host = node(HOST, "Adrian");
            host.become_host(Some(9));
            let mut nodes = vec![host];
            for (id, name) in [(A, "Vic"), (B, "Jorge"), (C, "Daniel")] {
                let mut n = node(id, name);
                n.become_client();
                nodes.push(n);
            }
            Self { nodes }
        }

        fn get(&mut self, id: PeerId) -> &mut Controller<MemoryContacts> {
            self.nodes.iter_mut().find(|n| n.id() == id).unwrap()
        }

        fn deliver(&mut self, from: PeerId, actions: Vec<Action>, now: u64) {
            for action in actions {
                if let Action::Send { dest, bytes } = action {
                    for n in &mut self.nodes {
                        let id = n.id();
                        if id != from && (dest.is_broadcast() || dest == id) {
                            n.enqueue(from, bytes.clone(), now);
                        }
                    }
                }
            }
        }

        fn step(&mut self, now: u64) {
            let mut outgoing = Vec::new();
            for n in &mut self.nodes {
                outgoing.push((n.id(), n.tick(now)));
            }
            for (from, actions) in outgoing {
                self.deliver(from, actions, now);
            }
        }
    }

    fn node(id: PeerId, name: &str) -> Controller<MemoryContacts> {
        Controller::new(
            MemoryContacts::new(Identity::new(id, name)),
            GameConfig::default(),
        )
    }

    #[test]
    fn full_game_over_the_air() {
        let mut w = World::new();
        let mut now = 0;
        while w.get(HOST).session().unwrap().peers().len() < 3 {
            w.step(now);
            now += 100;
            assert!(now < 20_000, "clients never joined");
        }
        for _ in 0..3 {
            w.step(now);
            now += 100;
        }
        for id in [A, B, C] {
            assert_eq!(w.get(id).client().unwrap().host_id(), Some(HOST));
        }
        assert_eq!(
            w.get(HOST).contacts().lookup(A).map(|i| i.name),
            Some("Vic".to_string())
        );

        let start = w.get(HOST).session_mut().unwrap().start_game(now).unwrap();
        w.deliver(HOST, start, now);
        while w.get(A).client().unwrap().phase() != ClientPhase::Playing {
            w.step(now);
            now += 100;
        }
        let round = w.get(A).client().unwrap().last_round().unwrap();
        let unsafe_button = round.rule_parameter.unwrap();
        let safe_button = (unsafe_button + 1) % 16;
        for (id, button) in [(A, unsafe_button), (B, unsafe_button), (C, safe_button)] {
            w.step(now);
            let out = w.get(id).client_mut().unwrap().submit_choice(button, now);
            w.deliver(id, out, now);
        }
        while w.get(HOST).session().unwrap().phase() != Phase::GameOver {
            w.step(now);
            now += 100;
            assert!(now < 60_000, "game never finished");
        }
        for _ in 0..5 {
            w.step(now);
            now += 100;
        }
        assert_eq!(w.get(HOST).session().unwrap().winner(), Some(C));
        assert_eq!(w.get(C).client().unwrap().phase(), ClientPhase::Won);
        assert_eq!(w.get(A).client().unwrap().phase(), ClientPhase::Eliminated);
        assert_eq!(w.get(B).client().unwrap().phase(), ClientPhase::Eliminated);
    }

    #[test]
    fn malformed_packets_do_not_stop_the_loop() {
        let mut host = node(HOST, "Adrian");
        host.become_host(Some(1));
        host.enqueue(A, Vec::new(), 0);
        host.enqueue(A, vec![0xEE], 0);
        let join = crate::wire::encode_packet(&crate::protocol::Packet::JoinRequest(
            crate::protocol::JoinRequest {
                id: A,
                name: "Vic".into(),
                profile: Vec::new(),
            },
        ))
        .unwrap();
        host.enqueue(A, join, 0);
        host.tick(0);
        assert!(host.session().unwrap().peers().contains(A));
    }

    #[test]
    fn tick_processes_bounded_batch() {
        let mut host = node(HOST, "Adrian");
        host.become_host(Some(1));
        let max = host.config().max_packets_per_tick;
        let cap = host.config().queue_capacity;
        let hb = crate::wire::encode_packet(&crate::protocol::Packet::Heartbeat).unwrap();
        for _ in 0..cap + 5 {
            host.enqueue(A, hb.clone(), 0);
        }
        assert_eq!(host.queue().len(), cap);
        assert_eq!(host.queue().dropped(), 5);
        host.tick(0);
        assert_eq!(host.queue().len(), cap - max);
    }

    #[test]
    fn switching_role_tears_down_client() {
        let mut n = node(A, "Vic");
        n.become_client();
        n.enqueue(
            HOST,
            crate::wire::encode_packet(&crate::protocol::Packet::JoinResponse(
                crate::protocol::JoinResponse {
                    accepted: true,
                    message: String::new(),
                },
            ))
            .unwrap(),
            0,
        );
        n.tick(0);
        assert_eq!(n.client().unwrap().host_id(), Some(HOST));
        let out = n.become_host(None);
        assert_eq!(out.iter().filter_map(Action::dest).collect::<Vec<_>>(), vec![HOST]);
        assert_eq!(n.role().name(), "host");
        assert!(n.client().is_none());
        assert!(n.queue().is_empty());
    }
}
