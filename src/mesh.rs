//! Discovery, address assignment and payload exchange.
//!
//! One `Mesh` instance drives one node. The enclosing application calls
//! [Mesh::update] on a fixed tick; everything else is non-blocking and
//! strictly sequential, so no state transition can interleave with another.

use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::address::{self, next_free_child, NodeAddress, TreeAddress, BROADCAST};
use crate::directory::{NodeDirectory, DEFAULT_CAPACITY};
use crate::payload::{Payload, PayloadError};
use crate::transport::frame::MAX_BODY_LEN;
use crate::transport::{Header, MessageKind, Transport};
use crate::NodeId;

/// Default cadence of the homeless ping broadcast.
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(30);

/// Grant body: target identity + granted address.
const GRANT_BODY_LEN: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("no known address for node {0}")]
    UnknownPeer(NodeId),

    #[error("payload was not delivered to node {0}")]
    DeliveryFailed(NodeId),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// Protocol state of the local node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The distinguished root node; holds the root address forever.
    Base,
    /// No tree address; transmitting from the broadcast sentinel.
    Homeless,
    /// Ping broadcast sent, waiting for an address grant.
    Pinging,
    /// Tree address applied and confirmed; payload exchange allowed.
    Ready,
}

/// Node configuration. Everything beyond channel and identity has
/// deployment defaults.
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Radio channel number, forwarded to the transport.
    pub channel: u8,
    /// This node's stable identity.
    pub node_id: NodeId,
    /// Identity of the base station.
    pub base_id: NodeId,
    /// Cadence of the homeless ping broadcast.
    pub ping_period: Duration,
    /// Peer slots in the node directory.
    pub directory_capacity: usize,
}

impl MeshConfig {
    pub fn new(channel: u8, node_id: NodeId) -> Self {
        MeshConfig {
            channel,
            node_id,
            base_id: 0,
            ping_period: DEFAULT_PING_PERIOD,
            directory_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Fires at a fixed period; the first check after construction fires
/// immediately so a fresh node announces itself on its first tick.
struct PingTimer {
    period: Duration,
    last: Option<Instant>,
}

impl PingTimer {
    fn new(period: Duration) -> Self {
        PingTimer { period, last: None }
    }

    fn fired(&mut self) -> bool {
        match self.last {
            Some(last) if last.elapsed() < self.period => false,
            _ => {
                self.last = Some(Instant::now());
                true
            }
        }
    }
}

/// Mesh network layer over any [Transport].
pub struct Mesh<T: Transport> {
    transport: T,
    channel: u8,
    node_id: NodeId,
    base_id: NodeId,
    node_address: NodeAddress,
    state: State,
    directory: NodeDirectory,
    ping_timer: PingTimer,
}

impl<T: Transport> Mesh<T> {
    pub fn new(transport: T, config: MeshConfig) -> Self {
        Mesh {
            transport,
            channel: config.channel,
            node_id: config.node_id,
            base_id: config.base_id,
            node_address: NodeAddress::Unassigned,
            state: State::Homeless,
            directory: NodeDirectory::with_capacity(config.directory_capacity),
            ping_timer: PingTimer::new(config.ping_period),
        }
    }

    /// Brings up the network. The base identity starts at the root address;
    /// everyone else starts homeless at the broadcast sentinel.
    pub fn begin(&mut self) {
        if self.node_id == self.base_id {
            self.state = State::Base;
            self.node_address = NodeAddress::Root;
        } else {
            self.state = State::Homeless;
            self.node_address = NodeAddress::Unassigned;
        }
        self.directory.clear();
        self.transport
            .configure(self.channel, self.node_address.to_wire());
        info!(
            "initializing node: id: {}, address: 0o{:o}",
            self.node_id,
            self.node_address.to_wire()
        );
    }

    /// Whether payloads can be exchanged right now. A base is ready while
    /// it knows at least one peer; everyone else once their address is
    /// confirmed.
    pub fn ready(&self) -> bool {
        match self.state {
            State::Base => !self.directory.is_empty(),
            State::Ready => true,
            State::Homeless | State::Pinging => false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn node_address(&self) -> NodeAddress {
        self.node_address
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn directory(&self) -> &NodeDirectory {
        &self.directory
    }

    /// One protocol tick: drains pending discovery frames, then broadcasts
    /// the periodic ping while the node still transmits from the broadcast
    /// sentinel. Application frames stay queued for [Mesh::receive].
    pub fn update(&mut self) {
        while self.transport.available() {
            let Some(header) = self.transport.peek_header() else {
                break;
            };
            match MessageKind::try_from(header.kind) {
                Ok(MessageKind::Ping) => self.handle_ping(&header),
                Ok(MessageKind::AddressGrant) => self.handle_grant(),
                Ok(MessageKind::Message) => break,
                Err(err) => {
                    let mut buf = [0u8; MAX_BODY_LEN];
                    self.transport.read(&mut buf);
                    error!(
                        "node {}, 0o{:o}: {}",
                        self.node_id,
                        self.node_address.to_wire(),
                        err
                    );
                }
            }
        }

        if self.node_address.is_broadcast() && self.ping_timer.fired() {
            if self.send_ping() && self.state == State::Homeless {
                self.state = State::Pinging;
            }
        }
    }

    /// Sends `payload` to the node with stable identity `to_id`.
    ///
    /// A failed delivery repairs local state before returning: the base
    /// evicts the peer it could not reach, any other node assumes its own
    /// address went stale and renegotiates from scratch.
    pub fn send(&mut self, mut payload: Payload, to_id: NodeId) -> Result<(), SendError> {
        let to_address = if to_id == self.base_id {
            address::BASE
        } else {
            self.directory
                .get(to_id)
                .map(TreeAddress::get)
                .ok_or(SendError::UnknownPeer(to_id))?
        };
        payload.sender = self.node_id;
        let header = Header::new(to_address, self.node_address.to_wire(), MessageKind::Message);
        debug!(
            "node {}: sending payload to {}: {}",
            self.node_id, to_id, payload
        );
        if self.transport.write(&header, &payload.to_bytes()) {
            return Ok(());
        }
        if self.state == State::Base {
            self.directory.remove(to_id);
            warn!(
                "node {}: delivery to {} failed, dropped from the directory",
                self.node_id, to_id
            );
        } else {
            warn!(
                "node {}: delivery to {} failed, resetting",
                self.node_id, to_id
            );
            self.reset();
        }
        Err(SendError::DeliveryFailed(to_id))
    }

    /// Whether an application payload is queued.
    pub fn available(&mut self) -> bool {
        self.transport
            .peek_header()
            .map(|header| header.kind == MessageKind::Message.tag())
            .unwrap_or(false)
    }

    /// Next application payload, if any. Discovery frames are never
    /// consumed here; an undecodable payload body is dropped.
    pub fn receive(&mut self) -> Option<Payload> {
        let header = self.transport.peek_header()?;
        if header.kind != MessageKind::Message.tag() {
            return None;
        }
        let mut buf = [0u8; MAX_BODY_LEN];
        let (_, n) = self.transport.read(&mut buf)?;
        match Payload::try_from_bytes(&buf[..n]) {
            Ok(payload) => {
                debug!("node {}: received payload: {}", self.node_id, payload);
                Some(payload)
            }
            Err(err) => {
                warn!("node {}: discarding bad payload: {}", self.node_id, err);
                None
            }
        }
    }

    /// Drops all routing state and renegotiates an address from scratch.
    /// The base never resets; it prunes unreachable peers one by one
    /// instead.
    pub fn reset(&mut self) {
        if self.state == State::Base {
            warn!("node {}: base node never resets", self.node_id);
            return;
        }
        self.directory.clear();
        self.state = State::Homeless;
        self.node_address = NodeAddress::Unassigned;
        self.transport.configure(self.channel, BROADCAST);
        info!("node {}: reset to homeless", self.node_id);
    }

    fn send_ping(&mut self) -> bool {
        let header = Header::new(BROADCAST, self.node_address.to_wire(), MessageKind::Ping);
        let ok = self.transport.write(&header, &self.node_id.to_be_bytes());
        if ok {
            debug!(
                "node {}, 0o{:o}: broadcast ping",
                self.node_id,
                self.node_address.to_wire()
            );
        } else {
            warn!("node {}: ping broadcast failed", self.node_id);
        }
        ok
    }

    fn handle_ping(&mut self, header: &Header) {
        let mut buf = [0u8; MAX_BODY_LEN];
        let Some((_, n)) = self.transport.read(&mut buf) else {
            return;
        };
        if n < 2 {
            warn!("node {}: truncated ping body", self.node_id);
            return;
        }
        let id = u16::from_be_bytes([buf[0], buf[1]]);
        if id == self.node_id {
            // Our own broadcast looped back.
            trace!("node {}: ignoring ping echo", self.node_id);
            return;
        }
        trace!(
            "node {}: ping from node {} at 0o{:o}",
            self.node_id,
            id,
            header.from
        );
        if header.from == BROADCAST {
            self.grant_address(id);
        } else {
            // A node announcing a real address; remember where it lives.
            match TreeAddress::new(header.from) {
                Ok(addr) => {
                    if self.directory.insert(id, addr) {
                        debug!(
                            "node {}: directory updated, {} -> 0o{:o}",
                            self.node_id,
                            id,
                            addr.get()
                        );
                    }
                }
                Err(err) => warn!("node {}: ping with bad source: {}", self.node_id, err),
            }
        }
    }

    /// Answers a homeless node's ping with an address grant. Only a node
    /// holding a real tree address owns child slots to hand out.
    fn grant_address(&mut self, id: NodeId) {
        if self.node_address.is_broadcast() {
            trace!("node {}: homeless, cannot grant to {}", self.node_id, id);
            return;
        }
        // Reuse the slot a known node was already granted; re-pings after a
        // lost grant stay idempotent.
        let addr = match self.directory.get(id) {
            Some(addr) => addr,
            None => match next_free_child(self.node_address, &self.directory) {
                Ok(addr) => addr,
                Err(err) => {
                    warn!("node {}: no grant for node {}: {}", self.node_id, id, err);
                    return;
                }
            },
        };
        // Recorded before the grant leaves, so a second homeless node
        // pinging in the same cycle can never be offered the same slot.
        if !self.directory.insert(id, addr) {
            warn!("node {}: directory full, not granting to {}", self.node_id, id);
            return;
        }
        let mut body = [0u8; GRANT_BODY_LEN];
        body[..2].copy_from_slice(&id.to_be_bytes());
        body[2..].copy_from_slice(&addr.get().to_be_bytes());
        let header = Header::new(BROADCAST, self.node_address.to_wire(), MessageKind::AddressGrant);
        info!(
            "node {}: granting 0o{:o} to node {}",
            self.node_id,
            addr.get(),
            id
        );
        if !self.transport.write(&header, &body) {
            // Entry stays; the requester will re-ping and get the same slot.
            warn!("node {}: grant to {} not accepted by link", self.node_id, id);
        }
    }

    fn handle_grant(&mut self) {
        let mut buf = [0u8; MAX_BODY_LEN];
        let Some((_, n)) = self.transport.read(&mut buf) else {
            return;
        };
        if n < GRANT_BODY_LEN {
            warn!("node {}: truncated grant body", self.node_id);
            return;
        }
        let target = u16::from_be_bytes([buf[0], buf[1]]);
        let raw_addr = u16::from_be_bytes([buf[2], buf[3]]);
        if target != self.node_id {
            // Grants go out on the broadcast address; this one is for a
            // different homeless node in radio range.
            trace!("node {}: grant for node {} ignored", self.node_id, target);
            return;
        }
        if !matches!(self.state, State::Homeless | State::Pinging) {
            debug!(
                "node {}: grant ignored in state {:?}",
                self.node_id, self.state
            );
            return;
        }
        match TreeAddress::new(raw_addr) {
            Ok(addr) => self.apply_address(addr),
            Err(err) => warn!("node {}: rejecting grant: {}", self.node_id, err),
        }
    }

    /// Applies a granted address and confirms it with a ping sent from the
    /// new address, which teaches the granting node our identity binding.
    fn apply_address(&mut self, addr: TreeAddress) {
        info!(
            "reinitializing node: id: {}, new address: 0o{:o}",
            self.node_id,
            addr.get()
        );
        self.node_address = NodeAddress::Assigned(addr);
        self.transport.configure(self.channel, addr.get());
        if self.send_ping() {
            self.state = State::Ready;
        } else {
            warn!(
                "node {}: confirmation ping failed, renegotiating",
                self.node_id
            );
            self.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::frame;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct Shared {
        channel: u8,
        address: u16,
        inbox: VecDeque<(Header, Vec<u8>)>,
        outbox: Vec<(Header, Vec<u8>)>,
        fail_writes: bool,
        configures: usize,
    }

    /// Single-node fake: the test injects inbound frames and inspects what
    /// the node wrote.
    #[derive(Clone, Default)]
    struct FakeTransport(Rc<RefCell<Shared>>);

    impl FakeTransport {
        fn push(&self, header: Header, body: &[u8]) {
            self.0.borrow_mut().inbox.push_back((header, body.to_vec()));
        }

        fn fail_writes(&self, fail: bool) {
            self.0.borrow_mut().fail_writes = fail;
        }

        fn sent(&self) -> Vec<(Header, Vec<u8>)> {
            self.0.borrow().outbox.clone()
        }

        fn address(&self) -> u16 {
            self.0.borrow().address
        }
    }

    impl Transport for FakeTransport {
        fn configure(&mut self, channel: u8, address: u16) {
            let mut shared = self.0.borrow_mut();
            shared.channel = channel;
            shared.address = address;
            shared.configures += 1;
        }

        fn write(&mut self, header: &Header, body: &[u8]) -> bool {
            let mut shared = self.0.borrow_mut();
            if shared.fail_writes {
                return false;
            }
            shared.outbox.push((*header, body.to_vec()));
            true
        }

        fn available(&mut self) -> bool {
            !self.0.borrow().inbox.is_empty()
        }

        fn peek_header(&mut self) -> Option<Header> {
            self.0.borrow().inbox.front().map(|(header, _)| *header)
        }

        fn read(&mut self, buf: &mut [u8]) -> Option<(Header, usize)> {
            let (header, body) = self.0.borrow_mut().inbox.pop_front()?;
            let n = body.len().min(buf.len());
            buf[..n].copy_from_slice(&body[..n]);
            Some((header, n))
        }
    }

    fn mesh(node_id: NodeId) -> (Mesh<FakeTransport>, FakeTransport) {
        let transport = FakeTransport::default();
        let mut config = MeshConfig::new(0, node_id);
        config.ping_period = Duration::ZERO;
        let mut mesh = Mesh::new(transport.clone(), config);
        mesh.begin();
        (mesh, transport)
    }

    fn ping(from: u16, id: NodeId) -> (Header, Vec<u8>) {
        (
            Header::new(BROADCAST, from, MessageKind::Ping),
            id.to_be_bytes().to_vec(),
        )
    }

    fn grant(target: NodeId, addr: u16) -> (Header, Vec<u8>) {
        let mut body = Vec::new();
        body.extend_from_slice(&target.to_be_bytes());
        body.extend_from_slice(&addr.to_be_bytes());
        (
            Header::new(BROADCAST, address::BASE, MessageKind::AddressGrant),
            body,
        )
    }

    fn grants_in(sent: &[(Header, Vec<u8>)]) -> Vec<u16> {
        sent.iter()
            .filter(|(header, _)| header.kind == MessageKind::AddressGrant.tag())
            .map(|(_, body)| u16::from_be_bytes([body[2], body[3]]))
            .collect()
    }

    #[test]
    fn base_starts_at_root_and_not_ready() {
        let (base, transport) = mesh(0);
        assert_eq!(base.state(), State::Base);
        assert_eq!(base.node_address(), NodeAddress::Root);
        assert_eq!(transport.address(), 0);
        assert!(!base.ready());
    }

    #[test]
    fn base_grants_first_free_slot() {
        let (mut base, transport) = mesh(0);
        let (header, body) = ping(BROADCAST, 7);
        transport.push(header, &body);
        base.update();

        assert_eq!(grants_in(&transport.sent()), vec![0o1]);
        assert_eq!(base.directory().get(7).unwrap().get(), 0o1);
        assert!(base.ready());
    }

    #[test]
    fn ping_echo_has_no_side_effects() {
        let (mut base, transport) = mesh(0);
        let (header, body) = ping(BROADCAST, 0);
        transport.push(header, &body);
        base.update();

        assert!(transport.sent().is_empty());
        assert!(base.directory().is_empty());
    }

    #[test]
    fn repeated_ping_is_regranted_the_same_slot() {
        let (mut base, transport) = mesh(0);
        for _ in 0..2 {
            let (header, body) = ping(BROADCAST, 7);
            transport.push(header, &body);
            base.update();
        }
        assert_eq!(grants_in(&transport.sent()), vec![0o1, 0o1]);
        assert_eq!(base.directory().len(), 1);
    }

    #[test]
    fn interleaved_pings_get_distinct_slots_until_exhaustion() {
        let (mut base, transport) = mesh(0);
        for id in 11..=16 {
            let (header, body) = ping(BROADCAST, id);
            transport.push(header, &body);
        }
        base.update();

        let granted = grants_in(&transport.sent());
        assert_eq!(granted, vec![0o1, 0o2, 0o3, 0o4, 0o5]);
        assert!(!base.directory().contains_id(16));
    }

    #[test]
    fn homeless_node_pings_then_waits() {
        let (mut leaf, transport) = mesh(7);
        assert_eq!(leaf.state(), State::Homeless);
        leaf.update();
        assert_eq!(leaf.state(), State::Pinging);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.kind, MessageKind::Ping.tag());
        assert_eq!(sent[0].0.to, BROADCAST);
        assert_eq!(sent[0].1, 7u16.to_be_bytes());
    }

    #[test]
    fn grant_is_applied_and_confirmed() {
        let (mut leaf, transport) = mesh(7);
        let (header, body) = grant(7, 0o1);
        transport.push(header, &body);
        leaf.update();

        assert_eq!(leaf.state(), State::Ready);
        assert!(leaf.ready());
        assert_eq!(leaf.node_address().to_wire(), 0o1);
        assert_eq!(transport.address(), 0o1);
        // Confirmation ping from the new address, no broadcast ping after.
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.kind, MessageKind::Ping.tag());
        assert_eq!(sent[0].0.from, 0o1);
    }

    #[test]
    fn grant_for_another_identity_is_ignored() {
        let (mut leaf, transport) = mesh(7);
        let (header, body) = grant(9, 0o1);
        transport.push(header, &body);
        leaf.update();

        assert_eq!(leaf.state(), State::Pinging);
        assert_eq!(leaf.node_address(), NodeAddress::Unassigned);
        assert_eq!(transport.address(), BROADCAST);
    }

    #[test]
    fn grant_while_ready_is_ignored() {
        let (mut leaf, transport) = mesh(7);
        let (header, body) = grant(7, 0o1);
        transport.push(header, &body);
        leaf.update();
        let (header, body) = grant(7, 0o2);
        transport.push(header, &body);
        leaf.update();

        assert_eq!(leaf.node_address().to_wire(), 0o1);
    }

    #[test]
    fn invalid_granted_address_is_rejected() {
        let (mut leaf, transport) = mesh(7);
        let (header, body) = grant(7, 0o67);
        transport.push(header, &body);
        leaf.update();

        assert_ne!(leaf.state(), State::Ready);
        assert_eq!(leaf.node_address(), NodeAddress::Unassigned);
    }

    #[test]
    fn failed_confirmation_ping_resets_the_node() {
        let (mut leaf, transport) = mesh(7);
        transport.fail_writes(true);
        let (header, body) = grant(7, 0o1);
        transport.push(header, &body);
        leaf.update();

        assert_eq!(leaf.state(), State::Homeless);
        assert_eq!(leaf.node_address(), NodeAddress::Unassigned);
        assert_eq!(transport.address(), BROADCAST);
        assert!(leaf.directory().is_empty());
    }

    #[test]
    fn send_to_unknown_peer_fails_locally() {
        let (mut leaf, _transport) = mesh(7);
        let payload = Payload::new("temp", 21).unwrap();
        assert_eq!(leaf.send(payload, 5), Err(SendError::UnknownPeer(5)));
    }

    #[test]
    fn send_stamps_the_sender_identity() {
        let (mut leaf, transport) = mesh(7);
        let (header, body) = grant(7, 0o1);
        transport.push(header, &body);
        leaf.update();

        leaf.send(Payload::new("temp", 21).unwrap(), 0).unwrap();
        let (header, body) = transport.sent().pop().unwrap();
        assert_eq!(header.kind, MessageKind::Message.tag());
        assert_eq!(header.to, address::BASE);
        assert_eq!(header.from, 0o1);
        let payload = Payload::try_from_bytes(&body).unwrap();
        assert_eq!(payload.sender, 7);
        assert_eq!(payload.key(), "temp");
        assert_eq!(payload.value, 21);
    }

    #[test]
    fn base_evicts_unreachable_peer_on_failed_send() {
        let (mut base, transport) = mesh(0);
        let (header, body) = ping(0o1, 7);
        transport.push(header, &body);
        base.update();
        assert!(base.ready());

        transport.fail_writes(true);
        let payload = Payload::new("temp", 21).unwrap();
        assert_eq!(base.send(payload, 7), Err(SendError::DeliveryFailed(7)));
        assert!(!base.directory().contains_id(7));
        assert!(!base.ready());
        assert_eq!(base.state(), State::Base);
    }

    #[test]
    fn leaf_resets_on_failed_send() {
        let (mut leaf, transport) = mesh(7);
        let (header, body) = grant(7, 0o1);
        transport.push(header, &body);
        leaf.update();
        let (header, body) = ping(0o2, 9);
        transport.push(header, &body);
        leaf.update();
        assert!(leaf.directory().contains_id(9));

        transport.fail_writes(true);
        let payload = Payload::new("temp", 21).unwrap();
        assert_eq!(leaf.send(payload, 9), Err(SendError::DeliveryFailed(9)));
        assert_eq!(leaf.state(), State::Homeless);
        assert_eq!(leaf.node_address(), NodeAddress::Unassigned);
        assert!(leaf.directory().is_empty());
        assert_eq!(transport.address(), BROADCAST);
    }

    #[test]
    fn reset_clears_all_state() {
        let (mut leaf, transport) = mesh(7);
        let (header, body) = grant(7, 0o1);
        transport.push(header, &body);
        leaf.update();
        let (header, body) = ping(0o2, 9);
        transport.push(header, &body);
        leaf.update();

        leaf.reset();
        assert_eq!(leaf.state(), State::Homeless);
        assert_eq!(leaf.node_address(), NodeAddress::Unassigned);
        assert!(leaf.directory().is_empty());
        assert_eq!(transport.address(), BROADCAST);
    }

    #[test]
    fn base_never_resets() {
        let (mut base, transport) = mesh(0);
        let (header, body) = ping(0o1, 7);
        transport.push(header, &body);
        base.update();

        base.reset();
        assert_eq!(base.state(), State::Base);
        assert!(base.directory().contains_id(7));
        assert_eq!(transport.address(), 0);
    }

    #[test]
    fn unknown_message_type_is_discarded() {
        let (mut base, transport) = mesh(0);
        transport.push(
            Header {
                to: 0,
                from: 0o1,
                kind: b'X',
            },
            &[1, 2, 3],
        );
        base.update();

        assert!(base.directory().is_empty());
        assert!(!base.available());
        // A ping behind the junk frame is still handled next tick.
        let (header, body) = ping(BROADCAST, 7);
        transport.push(header, &body);
        base.update();
        assert_eq!(grants_in(&transport.sent()), vec![0o1]);
    }

    #[test]
    fn application_frames_are_left_for_receive() {
        let (mut base, transport) = mesh(0);
        let mut payload = Payload::new("temp", 21).unwrap();
        payload.sender = 7;
        transport.push(
            Header::new(0, 0o1, MessageKind::Message),
            &payload.to_bytes(),
        );
        let (header, body) = ping(0o1, 7);
        transport.push(header, &body);
        base.update();

        // The ping is stuck behind the unread payload.
        assert!(base.directory().is_empty());
        assert!(base.available());
        let received = base.receive().unwrap();
        assert_eq!(received.sender, 7);
        assert_eq!(received.key(), "temp");
        assert_eq!(received.value, 21);

        base.update();
        assert!(base.directory().contains_id(7));
    }

    #[test]
    fn receive_skips_discovery_frames() {
        let (mut base, transport) = mesh(0);
        let (header, body) = ping(0o1, 7);
        transport.push(header, &body);
        assert!(!base.available());
        assert_eq!(base.receive(), None);
        // Still unconsumed for update() to dispatch.
        base.update();
        assert!(base.directory().contains_id(7));
    }

    #[test]
    fn bad_payload_body_is_dropped() {
        let (mut base, transport) = mesh(0);
        transport.push(Header::new(0, 0o1, MessageKind::Message), &[1, 2]);
        assert!(base.available());
        assert_eq!(base.receive(), None);
        assert!(!base.available());
    }

    #[test]
    fn relay_grants_below_its_own_address() {
        let (mut relay, transport) = mesh(3);
        let (header, body) = grant(3, 0o2);
        transport.push(header, &body);
        relay.update();
        assert_eq!(relay.state(), State::Ready);

        let (header, body) = ping(BROADCAST, 9);
        transport.push(header, &body);
        relay.update();
        assert_eq!(grants_in(&transport.sent()), vec![0o21]);
        assert_eq!(relay.directory().get(9).unwrap().get(), 0o21);
    }

    #[test]
    fn homeless_node_never_grants() {
        let (mut leaf, transport) = mesh(7);
        let (header, body) = ping(BROADCAST, 9);
        transport.push(header, &body);
        leaf.update();

        assert!(grants_in(&transport.sent()).is_empty());
        assert!(leaf.directory().is_empty());
    }

    #[test]
    fn frame_module_limits_cover_protocol_bodies() {
        // Grant and ping bodies must fit the transport body ceiling.
        assert!(GRANT_BODY_LEN <= frame::MAX_BODY_LEN);
        let payload = Payload::new("sixteen-chars-ok", i32::MAX).unwrap();
        assert!(payload.to_bytes().len() <= frame::MAX_BODY_LEN);
    }
}
