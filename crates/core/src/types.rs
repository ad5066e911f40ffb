/// Story, node, and job identifiers are opaque strings: UUID v4 in
/// production, deterministic sequences in tests (see [`crate::ids`]).
pub type Id = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
