use sha3::{Digest, Keccak256};

/// Computes the Keccak256 hash of the given bytes.
pub fn keccak<T: AsRef<[u8]>>(data: T) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    hasher.finalize().into()
}
