//! Run identifier generation
//!
//! Every invocation gets one random, human-readable identifier; all
//! execution names of that run are composed from it, so the whole run
//! shares a discoverable prefix.

use uuid::Uuid;

const DESCRIPTORS: &[&str] = &[
    "amber", "bold", "brisk", "calm", "clever", "copper", "daring", "eager", "fleet", "gentle",
    "hardy", "keen", "lively", "mellow", "nimble", "patient", "quiet", "rapid", "sharp", "steady",
    "sturdy", "swift", "vivid", "wandering",
];

const ANIMALS: &[&str] = &[
    "albatross", "badger", "beaver", "bison", "cormorant", "crane", "dolphin", "falcon", "gannet",
    "heron", "ibis", "lynx", "marlin", "narwhal", "osprey", "otter", "pelican", "petrel", "puffin",
    "seal", "tern", "turtle", "walrus", "wren",
];

/// Generates a random two-word run identifier, e.g. "swift-heron"
pub fn random_name() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let descriptor = DESCRIPTORS[usize::from(bytes[0]) % DESCRIPTORS.len()];
    let animal = ANIMALS[usize::from(bytes[1]) % ANIMALS.len()];
    format!("{descriptor}-{animal}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_shape() {
        let name = random_name();
        let parts: Vec<&str> = name.split('-').collect();
        assert_eq!(parts.len(), 2);
        assert!(DESCRIPTORS.contains(&parts[0]));
        assert!(ANIMALS.contains(&parts[1]));
    }
}
