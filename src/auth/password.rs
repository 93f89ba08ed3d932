use rand::RngCore;
use sha2::Sha256;

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Salted PBKDF2-HMAC-SHA256 password hashing.
///
/// Stored form is `hex(salt) ++ hex(derived_key)`: 32 hex characters of salt
/// followed by 64 of key. The iteration count is not embedded, so every
/// hasher that verifies a stored value must use the count it was created with.
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    iterations: u32,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl CredentialHasher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations: iterations.max(1) }
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let key = self.derive(password, &salt);

        let mut stored = hex::encode(salt);
        stored.push_str(&hex::encode(key));
        stored
    }

    /// Never fails: a malformed stored value simply does not verify.
    pub fn verify(&self, stored: &str, candidate: &str) -> bool {
        let (Some(salt_hex), Some(key_hex)) = (stored.get(..SALT_LEN * 2), stored.get(SALT_LEN * 2..)) else {
            return false;
        };
        let Ok(salt) = hex::decode(salt_hex) else {
            return false;
        };
        let Ok(expected) = hex::decode(key_hex) else {
            return false;
        };
        if expected.len() != KEY_LEN {
            return false;
        }

        let actual = self.derive(candidate, &salt);
        constant_time_eq(&actual, &expected)
    }

    fn derive(&self, password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut key);
        key
    }
}

/// Byte comparison whose running time depends only on the lengths.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
