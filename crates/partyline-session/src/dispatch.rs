//! Tag-indexed message routing.
//!
//! Two tables, because the two directions speak different dialects: a
//! host handles requests and state reports *from clients*, a client
//! applies authoritative state *from the host*. The hosting process
//! uses both: its listener dispatches through the host table and its
//! loopback client through the client table, same as any remote.
//!
//! Handlers take the shared state and return `(recipient, message)`
//! pairs; the caller delivers them. A tag nobody registered is logged
//! and dropped, never an error: unknown traffic is a version-skewed or
//! modded peer's problem, not a reason to kill the session.

use std::collections::HashMap;

use partyline_protocol::{Envelope, Message, PeerId, Recipient};

/// Messages a handler wants sent, paired with where they go.
pub type HandlerOutput = Vec<(Recipient, Message)>;

/// Handler for traffic a host receives from a client; `sender` is the
/// transport-verified origin, never taken from the payload.
pub type HostHandler<S> =
    Box<dyn FnMut(&mut S, PeerId, &Envelope) -> HandlerOutput + Send>;

/// Handler for traffic a client receives from the host.
pub type ClientHandler<S> =
    Box<dyn FnMut(&mut S, &Envelope) -> HandlerOutput + Send>;

/// The two dispatch tables of one process.
///
/// `S` is whatever state the handlers share; the dispatcher itself
/// holds no domain state and the tables are independent.
pub struct Dispatcher<S> {
    from_client: HashMap<u8, HostHandler<S>>,
    from_host: HashMap<u8, ClientHandler<S>>,
    dropped: u64,
}

impl<S> Default for Dispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Dispatcher<S> {
    pub fn new() -> Self {
        Self {
            from_client: HashMap::new(),
            from_host: HashMap::new(),
            dropped: 0,
        }
    }

    /// Registers the host-side handler for a tag, replacing (with a
    /// warning) any previous one.
    pub fn on_from_client<F>(&mut self, tag: u8, handler: F)
    where
        F: FnMut(&mut S, PeerId, &Envelope) -> HandlerOutput + Send + 'static,
    {
        if self.from_client.insert(tag, Box::new(handler)).is_some() {
            tracing::warn!(tag, "host handler replaced");
        }
    }

    /// Registers the client-side handler for a tag, replacing (with a
    /// warning) any previous one.
    pub fn on_from_host<F>(&mut self, tag: u8, handler: F)
    where
        F: FnMut(&mut S, &Envelope) -> HandlerOutput + Send + 'static,
    {
        if self.from_host.insert(tag, Box::new(handler)).is_some() {
            tracing::warn!(tag, "client handler replaced");
        }
    }

    /// Routes one client-originated envelope on the host.
    pub fn dispatch_from_client(
        &mut self,
        state: &mut S,
        sender: PeerId,
        envelope: &Envelope,
    ) -> HandlerOutput {
        let tag = envelope.message.tag();
        match self.from_client.get_mut(&tag) {
            Some(handler) => handler(state, sender, envelope),
            None => {
                self.dropped += 1;
                tracing::debug!(
                    tag,
                    %sender,
                    kind = envelope.message.name(),
                    "no host handler, dropping"
                );
                Vec::new()
            }
        }
    }

    /// Routes one host-originated envelope on a client.
    pub fn dispatch_from_host(
        &mut self,
        state: &mut S,
        envelope: &Envelope,
    ) -> HandlerOutput {
        let tag = envelope.message.tag();
        match self.from_host.get_mut(&tag) {
            Some(handler) => handler(state, envelope),
            None => {
                self.dropped += 1;
                tracing::debug!(
                    tag,
                    kind = envelope.message.name(),
                    "no client handler, dropping"
                );
                Vec::new()
            }
        }
    }

    pub fn handles_from_client(&self, tag: u8) -> bool {
        self.from_client.contains_key(&tag)
    }

    pub fn handles_from_host(&self, tag: u8) -> bool {
        self.from_host.contains_key(&tag)
    }

    /// Envelopes dropped for want of a handler, both directions.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<S> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("from_client_tags", &self.from_client.len())
            .field("from_host_tags", &self.from_host.len())
            .field("dropped", &self.dropped)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use partyline_protocol::tag;

    use super::*;

    #[derive(Default)]
    struct Counts {
        pings: u32,
        pongs: u32,
    }

    fn ping() -> Envelope {
        Envelope::new(7, Message::Ping)
    }

    #[test]
    fn test_dispatch_routes_to_registered_handler() {
        let mut d: Dispatcher<Counts> = Dispatcher::new();
        d.on_from_client(tag::PING, |state, sender, envelope| {
            state.pings += 1;
            vec![(
                Recipient::Peer(sender),
                Message::Pong {
                    echo_ms: envelope.sent_at_ms,
                },
            )]
        });

        let mut state = Counts::default();
        let out = d.dispatch_from_client(&mut state, PeerId(3), &ping());

        assert_eq!(state.pings, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, Recipient::Peer(PeerId(3)));
        assert_eq!(out[0].1, Message::Pong { echo_ms: 7 });
        assert_eq!(d.dropped(), 0);
    }

    #[test]
    fn test_unregistered_tag_dropped_and_counted() {
        let mut d: Dispatcher<Counts> = Dispatcher::new();
        let mut state = Counts::default();

        let out = d.dispatch_from_client(&mut state, PeerId(3), &ping());
        assert!(out.is_empty());
        assert_eq!(d.dropped(), 1);

        let out = d.dispatch_from_host(&mut state, &ping());
        assert!(out.is_empty());
        assert_eq!(d.dropped(), 2);
    }

    #[test]
    fn test_tables_are_independent() {
        let mut d: Dispatcher<Counts> = Dispatcher::new();
        d.on_from_host(tag::PONG, |state, _| {
            state.pongs += 1;
            Vec::new()
        });

        let mut state = Counts::default();
        let pong = Envelope::new(0, Message::Pong { echo_ms: 1 });

        // Registered on the client table only; the host table must not
        // pick it up.
        d.dispatch_from_host(&mut state, &pong);
        d.dispatch_from_client(&mut state, PeerId(2), &pong);

        assert_eq!(state.pongs, 1);
        assert_eq!(d.dropped(), 1);
        assert!(d.handles_from_host(tag::PONG));
        assert!(!d.handles_from_client(tag::PONG));
    }

    #[test]
    fn test_reregistering_replaces_handler() {
        let mut d: Dispatcher<Counts> = Dispatcher::new();
        d.on_from_host(tag::PING, |state, _| {
            state.pings += 1;
            Vec::new()
        });
        d.on_from_host(tag::PING, |state, _| {
            state.pings += 10;
            Vec::new()
        });

        let mut state = Counts::default();
        d.dispatch_from_host(&mut state, &ping());
        assert_eq!(state.pings, 10, "second registration wins");
    }

    #[test]
    fn test_game_range_tags_dispatch_like_core_ones() {
        let mut d: Dispatcher<Vec<u8>> = Dispatcher::new();
        d.on_from_client(0x90, |seen, _, envelope| {
            if let Message::Unknown { payload, .. } = &envelope.message {
                seen.extend_from_slice(payload);
            }
            Vec::new()
        });

        let mut seen = Vec::new();
        let custom = Envelope::new(
            0,
            Message::Unknown {
                tag: 0x90,
                payload: vec![1, 2, 3],
            },
        );
        d.dispatch_from_client(&mut seen, PeerId(4), &custom);
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
