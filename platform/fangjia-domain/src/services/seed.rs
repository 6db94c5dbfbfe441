use sha2::{Digest, Sha256};

/// Deterministic seed shared by every randomized step keyed on a district.
pub fn seed_for(city: &str, district: &str) -> u64 {
    let digest = Sha256::digest(format!("{city}/{district}").as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
