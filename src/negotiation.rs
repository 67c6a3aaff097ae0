//! Negotiator callbacks and the per-connection tables the handshake consults.

use core::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use portable_atomic::{AtomicU64, Ordering};

use crate::extensions::protocol_name::ProtocolName;

/// Opaque identity of one connection, used as the key of every negotiator binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    /// Allocates a handle no other connection in this process has.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationKind {
    Npn,
    Alpn,
}

impl fmt::Display for NegotiationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationKind::Npn => f.write_str("NPN"),
            NegotiationKind::Alpn => f.write_str("ALPN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    NpnClient,
    NpnServer,
    AlpnClient,
    AlpnServer,
}

impl Role {
    #[must_use]
    pub fn kind(self) -> NegotiationKind {
        match self {
            Role::NpnClient | Role::NpnServer => NegotiationKind::Npn,
            Role::AlpnClient | Role::AlpnServer => NegotiationKind::Alpn,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::NpnClient => f.write_str("NPN client"),
            Role::NpnServer => f.write_str("NPN server"),
            Role::AlpnClient => f.write_str("ALPN client"),
            Role::AlpnServer => f.write_str("ALPN server"),
        }
    }
}

/// Client side of ALPN. Implementations must be thread safe.
pub trait AlpnClientNegotiator: Send + Sync {
    /// Protocols to offer in the ClientHello, most preferred first.
    /// For HTTP/2 this is typically `h2` followed by `http/1.1`.
    fn protocols(&self, connection: ConnectionHandle) -> Vec<ProtocolName>;

    /// The protocol the server selected.
    fn protocol_selected(&self, connection: ConnectionHandle, protocol: &ProtocolName);
}

/// Server side of ALPN.
pub trait AlpnServerNegotiator: Send + Sync {
    /// Picks one of the client's offered protocols, or `None` when none is acceptable.
    fn select_protocol(
        &self,
        connection: ConnectionHandle,
        offered: &[ProtocolName],
    ) -> Option<ProtocolName>;

    fn protocol_selected(&self, _connection: ConnectionHandle, _protocol: &ProtocolName) {}
}

/// Client side of NPN.
pub trait NpnClientNegotiator: Send + Sync {
    /// Whether to announce NPN support in the ClientHello.
    fn wants_negotiation(&self, _connection: ConnectionHandle) -> bool {
        true
    }

    /// Picks a protocol from the server's advertisement, or `None` to give up.
    fn select_protocol(
        &self,
        connection: ConnectionHandle,
        advertised: &[ProtocolName],
    ) -> Option<ProtocolName>;

    fn protocol_selected(&self, connection: ConnectionHandle, protocol: &ProtocolName);
}

/// Server side of NPN.
pub trait NpnServerNegotiator: Send + Sync {
    /// Protocols to advertise in the ServerHello.
    fn supported_protocols(&self, connection: ConnectionHandle) -> Vec<ProtocolName>;

    /// Called by the engine once the client's NextProtocol message was read.
    fn protocol_selected(&self, _connection: ConnectionHandle, _protocol: &ProtocolName) {}
}

/// Negotiators of one role, keyed by connection.
///
/// Bindings do not keep the negotiator alive; a binding whose negotiator was dropped
/// behaves as if it had been removed.
pub struct NegotiatorTable<N: ?Sized> {
    role: Role,
    bindings: DashMap<ConnectionHandle, Weak<N>>,
}

impl<N: ?Sized> NegotiatorTable<N> {
    fn new(role: Role) -> Self {
        Self {
            role,
            bindings: DashMap::new(),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Binds `negotiator` to `connection` unless a live negotiator already is.
    ///
    /// Returns `false` and leaves the existing binding untouched in that case.
    pub fn bind(&self, connection: ConnectionHandle, negotiator: &Arc<N>) -> bool {
        match self.bindings.entry(connection) {
            Entry::Occupied(mut entry) => {
                if entry.get().strong_count() > 0 {
                    debug!("{} negotiator already bound to {}", self.role, connection);
                    return false;
                }
                entry.insert(Arc::downgrade(negotiator));
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::downgrade(negotiator));
            }
        }
        trace!("Bound {} negotiator to {}", self.role, connection);
        true
    }

    #[must_use]
    pub fn lookup(&self, connection: ConnectionHandle) -> Option<Arc<N>> {
        self.bindings
            .get(&connection)
            .and_then(|negotiator| negotiator.upgrade())
    }

    /// Removes and returns the binding for `connection`, if any.
    pub fn unbind(&self, connection: ConnectionHandle) -> Option<Arc<N>> {
        let (_, negotiator) = self.bindings.remove(&connection)?;
        trace!("Unbound {} negotiator from {}", self.role, connection);
        negotiator.upgrade()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

static GLOBAL_REGISTRY: Lazy<NegotiationRegistry> = Lazy::new(NegotiationRegistry::new);

/// The four negotiator tables, one per role.
pub struct NegotiationRegistry {
    npn_client: NegotiatorTable<dyn NpnClientNegotiator>,
    npn_server: NegotiatorTable<dyn NpnServerNegotiator>,
    alpn_client: NegotiatorTable<dyn AlpnClientNegotiator>,
    alpn_server: NegotiatorTable<dyn AlpnServerNegotiator>,
}

impl NegotiationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            npn_client: NegotiatorTable::new(Role::NpnClient),
            npn_server: NegotiatorTable::new(Role::NpnServer),
            alpn_client: NegotiatorTable::new(Role::AlpnClient),
            alpn_server: NegotiatorTable::new(Role::AlpnServer),
        }
    }

    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_REGISTRY
    }

    #[must_use]
    pub fn npn_client(&self) -> &NegotiatorTable<dyn NpnClientNegotiator> {
        &self.npn_client
    }

    #[must_use]
    pub fn npn_server(&self) -> &NegotiatorTable<dyn NpnServerNegotiator> {
        &self.npn_server
    }

    #[must_use]
    pub fn alpn_client(&self) -> &NegotiatorTable<dyn AlpnClientNegotiator> {
        &self.alpn_client
    }

    #[must_use]
    pub fn alpn_server(&self) -> &NegotiatorTable<dyn AlpnServerNegotiator> {
        &self.alpn_server
    }

    /// Drops every binding of `connection`; call when the connection goes away.
    pub fn unbind_all(&self, connection: ConnectionHandle) {
        self.npn_client.unbind(connection);
        self.npn_server.unbind(connection);
        self.alpn_client.unbind(connection);
        self.alpn_server.unbind(connection);
    }
}

impl Default for NegotiationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn setup() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }

    struct FixedServer(&'static str);

    impl NpnServerNegotiator for FixedServer {
        fn supported_protocols(&self, _connection: ConnectionHandle) -> Vec<ProtocolName> {
            vec![ProtocolName::from_latin1(self.0).unwrap()]
        }
    }

    fn advertised(negotiator: &Arc<dyn NpnServerNegotiator>, connection: ConnectionHandle) -> String {
        negotiator.supported_protocols(connection)[0].to_latin1()
    }

    #[test]
    fn test_handles_are_unique() {
        let a = ConnectionHandle::next();
        let b = ConnectionHandle::next();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn test_first_binding_wins() {
        setup();
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();

        let first: Arc<dyn NpnServerNegotiator> = Arc::new(FixedServer("h2"));
        let second: Arc<dyn NpnServerNegotiator> = Arc::new(FixedServer("spdy/3"));

        assert!(registry.npn_server().bind(connection, &first));
        assert!(!registry.npn_server().bind(connection, &second));

        let bound = registry.npn_server().lookup(connection).unwrap();
        assert_eq!("h2", advertised(&bound, connection));
    }

    #[test]
    fn test_lookup_without_binding() {
        setup();
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();

        assert!(registry.alpn_server().lookup(connection).is_none());
        assert!(registry.alpn_client().unbind(connection).is_none());
    }

    #[test]
    fn test_unbind_is_idempotent() {
        setup();
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();
        let negotiator: Arc<dyn NpnServerNegotiator> = Arc::new(FixedServer("h2"));

        registry.npn_server().bind(connection, &negotiator);
        let removed = registry.npn_server().unbind(connection).unwrap();
        assert!(Arc::ptr_eq(&negotiator, &removed));

        assert!(registry.npn_server().unbind(connection).is_none());
        assert!(registry.npn_server().lookup(connection).is_none());
        assert!(registry.npn_server().is_empty());
    }

    #[test]
    fn test_roles_are_independent() {
        setup();
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();
        let negotiator: Arc<dyn NpnServerNegotiator> = Arc::new(FixedServer("h2"));

        registry.npn_server().bind(connection, &negotiator);

        assert!(registry.npn_client().lookup(connection).is_none());
        assert!(registry.alpn_server().lookup(connection).is_none());
        assert_eq!(Role::NpnServer, registry.npn_server().role());
        assert_eq!(NegotiationKind::Npn, registry.npn_server().role().kind());
    }

    #[test]
    fn test_binding_does_not_own_negotiator() {
        setup();
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();

        let dropped: Arc<dyn NpnServerNegotiator> = Arc::new(FixedServer("spdy/3"));
        registry.npn_server().bind(connection, &dropped);
        drop(dropped);

        assert!(registry.npn_server().lookup(connection).is_none());

        let replacement: Arc<dyn NpnServerNegotiator> = Arc::new(FixedServer("h2"));
        assert!(registry.npn_server().bind(connection, &replacement));
        assert!(registry.npn_server().lookup(connection).is_some());

        registry.unbind_all(connection);
        assert!(registry.npn_server().is_empty());
    }

    #[test]
    fn test_concurrent_binds_for_same_connection() {
        setup();
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();
        let negotiators: Vec<Arc<dyn NpnServerNegotiator>> = (0..8)
            .map(|_| Arc::new(FixedServer("h2")) as Arc<dyn NpnServerNegotiator>)
            .collect();

        let registry = &registry;
        let wins = std::thread::scope(|s| {
            let handles: Vec<_> = negotiators
                .iter()
                .map(|negotiator| {
                    s.spawn(move || registry.npn_server().bind(connection, negotiator))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });

        assert_eq!(1, wins);
        assert_eq!(1, registry.npn_server().len());
    }
}
