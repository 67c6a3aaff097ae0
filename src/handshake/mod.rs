//! Negotiation steps the handshake engine runs around the hello messages.
//!
//! [`client_hello`] covers the ClientHello: the client adding its offers, the server
//! answering them. [`server_hello`] covers the client reading the server's answer.
//! A role without a bound negotiator is skipped and contributes no extension.

pub mod client_hello;
pub mod server_hello;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandshakeType {
    ClientHello = 1,
    ServerHello = 2,
    EncryptedExtensions = 8,
}

impl HandshakeType {
    #[must_use]
    pub fn of(num: u8) -> Option<Self> {
        match num {
            1 => Some(HandshakeType::ClientHello),
            2 => Some(HandshakeType::ServerHello),
            8 => Some(HandshakeType::EncryptedExtensions),
            _ => None,
        }
    }
}
