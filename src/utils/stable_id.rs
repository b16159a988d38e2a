//! Deterministic channel id generation
//!
//! The same (name, address) pair must always produce the same id so that
//! downstream deduplication keeps working across runs, reordering, and
//! partial-batch cancellation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Generate a deterministic UUID based on ordered hashable inputs.
pub fn generate_deterministic_id(inputs: &[&str]) -> Uuid {
    let mut hasher = DefaultHasher::new();

    for input in inputs {
        input.hash(&mut hasher);
    }

    let hash = hasher.finish();

    // DefaultHasher produces u64; widen it to fill the full u128.
    let uuid_bits = ((hash as u128) << 64) | (hash as u128);
    Uuid::from_u128(uuid_bits)
}

/// Generate the stable id for a channel from its display name and stream
/// address.
pub fn generate_channel_id(name: &str, address: &str) -> Uuid {
    generate_deterministic_id(&[name, address])
}
