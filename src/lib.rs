#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc
)]

/*!
NPN and ALPN support for a TLS handshake engine.

The engine hands raw hello-extension bytes to [`HelloExtensions::parse`], asks the
[`handshake`] steps to run the negotiators bound in a [`NegotiationRegistry`], and
serializes the resulting extensions back into its outgoing hello.

# Example

```
use std::sync::Arc;
use tls_protocol_negotiation::*;

struct PreferH2;

impl AlpnServerNegotiator for PreferH2 {
    fn select_protocol(
        &self,
        _connection: ConnectionHandle,
        offered: &[ProtocolName],
    ) -> Option<ProtocolName> {
        [ProtocolName::H2, ProtocolName::HTTP_1_1]
            .into_iter()
            .find_map(|ours| offered.iter().find(|theirs| *theirs == ours).cloned())
    }
}

let registry = NegotiationRegistry::new();
let connection = ConnectionHandle::next();
let negotiator: Arc<dyn AlpnServerNegotiator> = Arc::new(PreferH2);
registry.alpn_server().bind(connection, &negotiator);

// ClientHello extensions offering "http/1.1" and "h2".
let client_hello = [
    0x00, 0x12, 0x00, 0x10, 0x00, 0x0e, 0x00, 0x0c, 0x08, b'h', b't', b't', b'p', b'/', b'1',
    b'.', b'1', 0x02, b'h', b'2',
];
let offered = HelloExtensions::parse(&mut ParseBuffer::new(&client_hello), HandshakeType::ClientHello)
    .expect("malformed ClientHello extensions");

let mut server_hello = HelloExtensions::new();
handshake::client_hello::respond(connection, &registry, &offered, &mut server_hello)
    .expect("no common protocol");

assert_eq!(
    &[0x00, 0x07, 0x00, 0x10, 0x00, 0x03, 0x02, b'h', b'2'],
    server_hello.to_vec().unwrap().as_slice()
);
registry.alpn_server().unbind(connection);
```
*/

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

use core::fmt::{Display, Formatter};

pub mod alert;
mod buffer;
pub mod extensions;
pub mod handshake;
pub mod negotiation;
mod parse_buffer;

pub use alert::{Alert, AlertDescription, AlertFailure, AlertLevel, FailureCategory};
pub use buffer::WriteBuffer;
pub use extensions::extension_data::alpn::ApplicationLayerProtocolNegotiation;
pub use extensions::extension_data::npn::NextProtocolNegotiation;
pub use extensions::extension_data::unimplemented::Unimplemented;
pub use extensions::protocol_name::ProtocolName;
pub use extensions::{ExtensionRegistry, ExtensionType, HelloExtension, HelloExtensions};
pub use handshake::HandshakeType;
pub use negotiation::{
    AlpnClientNegotiator, AlpnServerNegotiator, ConnectionHandle, NegotiationKind,
    NegotiationRegistry, NegotiatorTable, NpnClientNegotiator, NpnServerNegotiator, Role,
};
pub use parse_buffer::{ParseBuffer, ParseError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TlsError {
    /// Malformed extension bytes: truncation, overrun or trailing data.
    ParseError(ParseError),
    DecodeError,
    EncodeError,
    InsufficientSpace,
    InvalidExtensionsLength,
    /// A protocol name that is empty, longer than 255 bytes or not representable in its charset.
    InvalidProtocolName,
    /// Neither side could agree on a protocol.
    NegotiationFailure(NegotiationKind),
    AbortHandshake(AlertLevel, AlertDescription),
}

impl TlsError {
    /// The alert a handshake terminated by this error must send.
    #[must_use]
    pub fn alert(&self) -> AlertDescription {
        match self {
            TlsError::ParseError(_) | TlsError::DecodeError | TlsError::InvalidExtensionsLength => {
                AlertDescription::DecodeError
            }
            TlsError::InvalidProtocolName => AlertDescription::IllegalParameter,
            TlsError::NegotiationFailure(NegotiationKind::Alpn) => {
                AlertDescription::NoApplicationProtocol
            }
            TlsError::NegotiationFailure(NegotiationKind::Npn) => {
                AlertDescription::HandshakeFailure
            }
            TlsError::EncodeError | TlsError::InsufficientSpace => AlertDescription::InternalError,
            TlsError::AbortHandshake(_, description) => *description,
        }
    }

    /// Terminates the handshake: the alert to send plus the failure to raise locally.
    #[must_use]
    pub fn into_failure(self) -> (Alert, AlertFailure) {
        let alert = Alert::for_error(&self);
        let failure = alert::classify(alert.description() as u8, Some(self), None);
        (alert, failure)
    }
}

impl From<ParseError> for TlsError {
    fn from(e: ParseError) -> Self {
        TlsError::ParseError(e)
    }
}

impl Display for TlsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            TlsError::ParseError(e) => write!(f, "error parsing extensions: {e:?}"),
            TlsError::DecodeError => f.write_str("error decoding extension data"),
            TlsError::EncodeError => f.write_str("error encoding extension data"),
            TlsError::InsufficientSpace => f.write_str("insufficient space in output buffer"),
            TlsError::InvalidExtensionsLength => f.write_str("invalid extensions length"),
            TlsError::InvalidProtocolName => f.write_str("invalid protocol name"),
            TlsError::NegotiationFailure(kind) => write!(f, "{kind} negotiation failed"),
            TlsError::AbortHandshake(level, description) => {
                write!(f, "handshake aborted: {level:?} {description}")
            }
        }
    }
}

impl std::error::Error for TlsError {}
