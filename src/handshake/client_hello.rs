use crate::{
    TlsError,
    alert::{AlertDescription, AlertLevel},
    extensions::{
        HelloExtension, HelloExtensions,
        extension_data::{alpn::ApplicationLayerProtocolNegotiation, npn::NextProtocolNegotiation},
    },
    negotiation::{ConnectionHandle, NegotiationKind, NegotiationRegistry},
};

/// Client side: adds the negotiation offers of `connection` to an outgoing ClientHello.
///
/// ALPN offers the client negotiator's protocol list; NPN is announced with an empty
/// extension.
pub fn offer(
    connection: ConnectionHandle,
    registry: &NegotiationRegistry,
    client_hello: &mut HelloExtensions,
) {
    if let Some(negotiator) = registry.alpn_client().lookup(connection) {
        let protocols = negotiator.protocols(connection);
        debug!("Offering ALPN protocols {:?} on {}", protocols, connection);
        client_hello.append(HelloExtension::ApplicationLayerProtocolNegotiation(
            ApplicationLayerProtocolNegotiation::Offered(protocols),
        ));
    }

    if let Some(negotiator) = registry.npn_client().lookup(connection) {
        if negotiator.wants_negotiation(connection) {
            debug!("Announcing NPN support on {}", connection);
            client_hello.append(HelloExtension::NextProtocolNegotiation(
                NextProtocolNegotiation::empty(),
            ));
        }
    }
}

/// Server side: answers the negotiation extensions of a received ClientHello.
///
/// An ALPN selection takes precedence over NPN, and once made the ALPN server
/// negotiator is told about it. Fails with `NegotiationFailure(Alpn)` when the
/// negotiator accepts none of the offered protocols.
pub fn respond(
    connection: ConnectionHandle,
    registry: &NegotiationRegistry,
    client_hello: &HelloExtensions,
    server_hello: &mut HelloExtensions,
) -> Result<(), TlsError> {
    if let Some(alpn) = client_hello.alpn() {
        if let Some(negotiator) = registry.alpn_server().lookup(connection) {
            let offered = alpn.protocols();

            let selected = negotiator
                .select_protocol(connection, offered)
                .ok_or_else(|| {
                    warn!("No common ALPN protocol in {:?} on {}", offered, connection);
                    TlsError::NegotiationFailure(NegotiationKind::Alpn)
                })?;

            // RFC 7301, Section 3.2: the selection must be one the client offered
            if !offered.contains(&selected) {
                warn!(
                    "ALPN negotiator selected {} which was not offered on {}",
                    selected, connection
                );
                return Err(TlsError::AbortHandshake(
                    AlertLevel::Fatal,
                    AlertDescription::InternalError,
                ));
            }

            debug!("Selected ALPN protocol {} on {}", selected, connection);
            server_hello.append(HelloExtension::ApplicationLayerProtocolNegotiation(
                ApplicationLayerProtocolNegotiation::Selected(selected.clone()),
            ));
            negotiator.protocol_selected(connection, &selected);
            return Ok(());
        }
    }

    if client_hello.npn().is_some() {
        if let Some(negotiator) = registry.npn_server().lookup(connection) {
            let advertised = NextProtocolNegotiation::from_protocols(
                negotiator.supported_protocols(connection),
            );
            debug!("Advertising NPN protocols {:?} on {}", advertised.protocols(), connection);
            server_hello.append(HelloExtension::NextProtocolNegotiation(advertised));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{offer, respond};
    use crate::{
        TlsError,
        alert::AlertDescription,
        extensions::{HelloExtensions, protocol_name::ProtocolName},
        negotiation::{
            AlpnClientNegotiator, AlpnServerNegotiator, ConnectionHandle, NegotiationKind,
            NegotiationRegistry, NpnClientNegotiator, NpnServerNegotiator,
        },
    };

    fn names(names: &[&str]) -> Vec<ProtocolName> {
        names
            .iter()
            .map(|name| ProtocolName::from_utf8(name).unwrap())
            .collect()
    }

    struct Offering(&'static [&'static str]);

    impl AlpnClientNegotiator for Offering {
        fn protocols(&self, _connection: ConnectionHandle) -> Vec<ProtocolName> {
            names(self.0)
        }

        fn protocol_selected(&self, _connection: ConnectionHandle, _protocol: &ProtocolName) {}
    }

    impl NpnClientNegotiator for Offering {
        fn select_protocol(
            &self,
            _connection: ConnectionHandle,
            advertised: &[ProtocolName],
        ) -> Option<ProtocolName> {
            advertised.first().cloned()
        }

        fn protocol_selected(&self, _connection: ConnectionHandle, _protocol: &ProtocolName) {}
    }

    impl NpnServerNegotiator for Offering {
        fn supported_protocols(&self, _connection: ConnectionHandle) -> Vec<ProtocolName> {
            names(self.0)
        }
    }

    /// Picks its first preference the client also offered.
    struct Preferring {
        preference: &'static [&'static str],
        selected: Mutex<Vec<String>>,
    }

    impl AlpnServerNegotiator for Preferring {
        fn select_protocol(
            &self,
            _connection: ConnectionHandle,
            offered: &[ProtocolName],
        ) -> Option<ProtocolName> {
            names(self.preference)
                .into_iter()
                .find(|ours| offered.contains(ours))
        }

        fn protocol_selected(&self, _connection: ConnectionHandle, protocol: &ProtocolName) {
            self.selected.lock().unwrap().push(protocol.to_string());
        }
    }

    #[test]
    fn test_offer_without_negotiators() {
        let registry = NegotiationRegistry::new();
        let mut client_hello = HelloExtensions::new();

        offer(ConnectionHandle::next(), &registry, &mut client_hello);

        assert!(client_hello.is_empty());
        assert!(client_hello.to_vec().unwrap().is_empty());
    }

    #[test]
    fn test_offer_alpn_and_npn() {
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();
        let alpn: Arc<dyn AlpnClientNegotiator> = Arc::new(Offering(&["h2", "http/1.1"]));
        let npn: Arc<dyn NpnClientNegotiator> = Arc::new(Offering(&[]));
        registry.alpn_client().bind(connection, &alpn);
        registry.npn_client().bind(connection, &npn);

        let mut client_hello = HelloExtensions::new();
        offer(connection, &registry, &mut client_hello);

        assert_eq!(names(&["h2", "http/1.1"]), client_hello.alpn().unwrap().protocols());
        assert!(client_hello.npn().unwrap().is_empty());
    }

    #[test]
    fn test_respond_selects_server_preference() {
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();
        let server = Arc::new(Preferring {
            preference: &["h2", "http/1.1"],
            selected: Mutex::new(Vec::new()),
        });
        let negotiator: Arc<dyn AlpnServerNegotiator> = server.clone();
        registry.alpn_server().bind(connection, &negotiator);

        let mut client_hello = HelloExtensions::new();
        let client: Arc<dyn AlpnClientNegotiator> = Arc::new(Offering(&["http/1.1", "h2"]));
        registry.alpn_client().bind(connection, &client);
        offer(connection, &registry, &mut client_hello);

        let mut server_hello = HelloExtensions::new();
        respond(connection, &registry, &client_hello, &mut server_hello).unwrap();

        assert_eq!(
            vec![0x00, 0x07, 0x00, 0x10, 0x00, 0x03, 0x02, b'h', b'2'],
            server_hello.to_vec().unwrap()
        );
        assert_eq!(vec!["h2".to_string()], *server.selected.lock().unwrap());
    }

    #[test]
    fn test_respond_without_common_protocol() {
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();
        let server = Arc::new(Preferring {
            preference: &["h2"],
            selected: Mutex::new(Vec::new()),
        });
        let negotiator: Arc<dyn AlpnServerNegotiator> = server.clone();
        registry.alpn_server().bind(connection, &negotiator);
        let client: Arc<dyn AlpnClientNegotiator> = Arc::new(Offering(&["spdy/3"]));
        registry.alpn_client().bind(connection, &client);

        let mut client_hello = HelloExtensions::new();
        offer(connection, &registry, &mut client_hello);

        let mut server_hello = HelloExtensions::new();
        let err = respond(connection, &registry, &client_hello, &mut server_hello).unwrap_err();

        assert_eq!(TlsError::NegotiationFailure(NegotiationKind::Alpn), err);
        assert_eq!(AlertDescription::NoApplicationProtocol, err.alert());
        assert!(server_hello.is_empty());
        assert!(server.selected.lock().unwrap().is_empty());
    }

    #[test]
    fn test_respond_advertises_npn() {
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();
        let client: Arc<dyn NpnClientNegotiator> = Arc::new(Offering(&[]));
        let server: Arc<dyn NpnServerNegotiator> = Arc::new(Offering(&["spdy/3", "http/1.1"]));
        registry.npn_client().bind(connection, &client);
        registry.npn_server().bind(connection, &server);

        let mut client_hello = HelloExtensions::new();
        offer(connection, &registry, &mut client_hello);

        let mut server_hello = HelloExtensions::new();
        respond(connection, &registry, &client_hello, &mut server_hello).unwrap();

        assert_eq!(
            vec!["spdy/3", "http/1.1"],
            server_hello.npn().unwrap().names()
        );
        assert!(server_hello.alpn().is_none());
    }

    #[test]
    fn test_respond_ignores_unbound_roles() {
        let registry = NegotiationRegistry::new();
        let connection = ConnectionHandle::next();
        let client: Arc<dyn AlpnClientNegotiator> = Arc::new(Offering(&["h2"]));
        registry.alpn_client().bind(connection, &client);

        let mut client_hello = HelloExtensions::new();
        offer(connection, &registry, &mut client_hello);

        let mut server_hello = HelloExtensions::new();
        respond(connection, &registry, &client_hello, &mut server_hello).unwrap();
        assert!(server_hello.is_empty());
    }
}
