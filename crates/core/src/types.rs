/// User identifiers are opaque strings (UUIDs in the default store).
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
