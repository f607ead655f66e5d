/// Deterministic serialization and hashing of evidence.
pub mod canonical;
pub mod hash;
