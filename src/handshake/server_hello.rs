use crate::{
    TlsError,
    alert::{AlertDescription, AlertLevel},
    extensions::{
        HelloExtensions, extension_data::alpn::ApplicationLayerProtocolNegotiation,
        protocol_name::ProtocolName,
    },
    negotiation::{ConnectionHandle, NegotiationKind, NegotiationRegistry},
};

/// Client side: consumes the negotiation extensions of a received ServerHello and
/// returns the agreed protocol, if any.
///
/// A negotiation extension the client never asked for aborts with
/// `unsupported_extension`.
pub fn complete(
    connection: ConnectionHandle,
    registry: &NegotiationRegistry,
    server_hello: &HelloExtensions,
) -> Result<Option<ProtocolName>, TlsError> {
    if let Some(alpn) = server_hello.alpn() {
        let ApplicationLayerProtocolNegotiation::Selected(selected) = alpn else {
            warn!("Server sent an ALPN list instead of a selection on {}", connection);
            return Err(TlsError::AbortHandshake(
                AlertLevel::Fatal,
                AlertDescription::IllegalParameter,
            ));
        };

        let Some(negotiator) = registry.alpn_client().lookup(connection) else {
            warn!("Unsolicited ALPN selection {} on {}", selected, connection);
            return Err(TlsError::AbortHandshake(
                AlertLevel::Fatal,
                AlertDescription::UnsupportedExtension,
            ));
        };

        debug!("Server selected ALPN protocol {} on {}", selected, connection);
        negotiator.protocol_selected(connection, selected);
        return Ok(Some(selected.clone()));
    }

    if let Some(npn) = server_hello.npn() {
        let Some(negotiator) = registry.npn_client().lookup(connection) else {
            warn!("Unsolicited NPN advertisement on {}", connection);
            return Err(TlsError::AbortHandshake(
                AlertLevel::Fatal,
                AlertDescription::UnsupportedExtension,
            ));
        };

        let selected = negotiator
            .select_protocol(connection, npn.protocols())
            .ok_or_else(|| {
                warn!(
                    "No NPN protocol chosen from {:?} on {}",
                    npn.protocols(),
                    connection
                );
                TlsError::NegotiationFailure(NegotiationKind::Npn)
            })?;

        debug!("Selected NPN protocol {} on {}", selected, connection);
        negotiator.protocol_selected(connection, &selected);
        return Ok(Some(selected));
    }

    trace!("No protocol negotiated on {}", connection);
    Ok(None)
}
