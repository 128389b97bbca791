use sha2::{Digest, Sha256};

/// 32 random bytes, hex encoded. This is the value sent to the user.
pub fn generate() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Lookup key for a token value. Only this digest is persisted.
pub fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
