use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;

/// A 128-bit random identifier.
///
/// Used as the opaque body of RabbitMQ topic SUBSCRIBE frames, where the
/// broker takes it as the seed for the transient queue name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uuid([u8; 16]);

impl Uuid {
    /// Draw 16 bytes from the operating system's entropy source.
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Uuid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Render with the URL-safe base64 alphabet (`+` becomes `-`, `/`
    /// becomes `_`); the `=` padding is kept.
    pub fn to_base64url(&self) -> String {
        URL_SAFE.encode(self.0)
    }
}
