use core::fmt;
use core::hash::{Hash, Hasher};
use std::borrow::Cow;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::TlsError;
use crate::buffer::WriteBuffer;
use crate::parse_buffer::{ParseBuffer, ParseError};

pub mod extension_data;
mod messages;
pub mod protocol_name;

pub use messages::{HelloExtension, HelloExtensions};

/// Identity of a hello extension. Two types are equal when their numeric ids are.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionType {
    id: u16,
    name: Option<&'static str>,
}

impl ExtensionType {
    // RFC 3546
    pub const SERVER_NAME: Self = Self::known(0x0000, "server_name");
    pub const MAX_FRAGMENT_LENGTH: Self = Self::known(0x0001, "max_fragment_length");
    pub const CLIENT_CERTIFICATE_URL: Self = Self::known(0x0002, "client_certificate_url");
    pub const TRUSTED_CA_KEYS: Self = Self::known(0x0003, "trusted_ca_keys");
    pub const TRUNCATED_HMAC: Self = Self::known(0x0004, "truncated_hmac");
    pub const STATUS_REQUEST: Self = Self::known(0x0005, "status_request");
    // RFC 4681
    pub const USER_MAPPING: Self = Self::known(0x0006, "user_mapping");
    // RFC 5081
    pub const CERT_TYPE: Self = Self::known(0x0009, "cert_type");
    // RFC 4492
    pub const ELLIPTIC_CURVES: Self = Self::known(0x000A, "elliptic_curves");
    pub const EC_POINT_FORMATS: Self = Self::known(0x000B, "ec_point_formats");
    // RFC 5054
    pub const SRP: Self = Self::known(0x000C, "srp");
    // RFC 5246
    pub const SIGNATURE_ALGORITHMS: Self = Self::known(0x000D, "signature_algorithms");
    // RFC 7301
    pub const APPLICATION_LAYER_PROTOCOL_NEGOTIATION: Self = Self::known(0x0010, "alpn");
    // RFC 7627
    pub const EXTENDED_MASTER_SECRET: Self = Self::known(0x0017, "extended_master_secret");
    // draft-agl-tls-nextprotoneg-03, never assigned by IANA
    pub const NEXT_PROTOCOL_NEGOTIATION: Self = Self::known(0x3374, "next_protocol_negotiation");
    // RFC 5746
    pub const RENEGOTIATION_INFO: Self = Self::known(0xFF01, "renegotiation_info");

    const SEED: [Self; 16] = [
        Self::SERVER_NAME,
        Self::MAX_FRAGMENT_LENGTH,
        Self::CLIENT_CERTIFICATE_URL,
        Self::TRUSTED_CA_KEYS,
        Self::TRUNCATED_HMAC,
        Self::STATUS_REQUEST,
        Self::USER_MAPPING,
        Self::CERT_TYPE,
        Self::ELLIPTIC_CURVES,
        Self::EC_POINT_FORMATS,
        Self::SRP,
        Self::SIGNATURE_ALGORITHMS,
        Self::APPLICATION_LAYER_PROTOCOL_NEGOTIATION,
        Self::EXTENDED_MASTER_SECRET,
        Self::NEXT_PROTOCOL_NEGOTIATION,
        Self::RENEGOTIATION_INFO,
    ];

    const fn known(id: u16, name: &'static str) -> Self {
        Self {
            id,
            name: Some(name),
        }
    }

    const fn unknown(id: u16) -> Self {
        Self { id, name: None }
    }

    /// Resolves `num` through the process-wide [`ExtensionRegistry`].
    #[must_use]
    pub fn of(num: u16) -> Self {
        ExtensionRegistry::global().resolve(num)
    }

    #[must_use]
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Registered name, or `type_<id>` for ids first seen on the wire.
    #[must_use]
    pub fn name(&self) -> Cow<'static, str> {
        match self.name {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("type_{}", self.id)),
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        self.name.is_some()
    }

    /// Reads a type id and resolves it through the process-wide [`ExtensionRegistry`].
    pub fn parse(buf: &mut ParseBuffer) -> Result<Self, ParseError> {
        ExtensionRegistry::global().parse(buf)
    }

    pub fn encode(&self, buf: &mut WriteBuffer) -> Result<(), TlsError> {
        buf.push_u16(self.id)
    }
}

impl PartialEq for ExtensionType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ExtensionType {}

impl Hash for ExtensionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ExtensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "type_{}", self.id),
        }
    }
}

static GLOBAL_REGISTRY: Lazy<ExtensionRegistry> = Lazy::new(ExtensionRegistry::new);

/// Table of every extension type seen by this process.
///
/// Starts out with the well-known types and only ever grows: ids first seen on the
/// wire are registered under a synthesized `type_<id>` name and kept for good.
pub struct ExtensionRegistry {
    types: DashMap<u16, ExtensionType>,
}

impl ExtensionRegistry {
    #[must_use]
    pub fn new() -> Self {
        let types = DashMap::with_capacity(ExtensionType::SEED.len());
        for ext_type in ExtensionType::SEED {
            types.insert(ext_type.id, ext_type);
        }
        Self { types }
    }

    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_REGISTRY
    }

    #[must_use]
    pub fn resolve(&self, id: u16) -> ExtensionType {
        if let Some(ext_type) = self.types.get(&id) {
            return *ext_type;
        }

        *self.types.entry(id).or_insert_with(|| {
            debug!("Registering unknown extension type {}", id);
            ExtensionType::unknown(id)
        })
    }

    /// Reads a type id from the wire and resolves it in this registry.
    pub fn parse(&self, buf: &mut ParseBuffer) -> Result<ExtensionType, ParseError> {
        Ok(self.resolve(buf.read_u16()?))
    }

    #[must_use]
    pub fn contains(&self, id: u16) -> bool {
        self.types.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
