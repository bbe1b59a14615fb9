//! Resource configurations and their canonical fingerprints.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A value describing everything that affects what a driver starts.
///
/// Implementors must include every field that influences the running
/// resource. A field left out of serialisation is a field whose change goes
/// unnoticed: forgetting a lockfile hash means a dependency update never
/// triggers a reinstall.
///
/// The provided methods encode the value as canonical JSON, so field order
/// and map iteration order never change the fingerprint.
pub trait ResourceConfig: Serialize + DeserializeOwned {
    /// Encodes the configuration as a canonical fingerprint.
    ///
    /// # Errors
    ///
    /// Returns the serialisation error when the value cannot be represented
    /// as JSON (for example a map with non-string keys).
    fn fingerprint(&self) -> Result<Fingerprint, serde_json::Error> {
        Fingerprint::of(self)
    }

    /// Decodes a configuration previously encoded with [`Self::fingerprint`].
    ///
    /// # Errors
    ///
    /// Returns the deserialisation error when the bytes do not describe a
    /// value of this type.
    fn from_fingerprint(fingerprint: &Fingerprint) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(fingerprint.as_bytes())
    }
}

/// Serialised snapshot of a configuration, compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    /// Computes the canonical encoding of `value`.
    ///
    /// The value is lowered to a JSON tree first; objects in that tree keep
    /// their keys sorted, which makes the written bytes independent of
    /// declaration order.
    ///
    /// # Errors
    ///
    /// Returns the serialisation error when `value` is not representable.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let tree = serde_json::to_value(value)?;
        serde_json::to_vec(&tree).map(Self)
    }

    /// Wraps bytes read back from storage.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the fingerprint, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}
