// Hash table profiles for the source and target match indexes.

/// Tuning parameters of one content hash table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashConfig {
    /// Name for display purposes.
    pub name: &'static str,
    /// Bytes hashed per key; also the shortest usable match.
    pub key_size: usize,
    /// Distance between indexed positions when pre-populating.
    pub step_size: usize,
    /// Positions kept per bucket. Later positions for a full bucket are dropped.
    pub slots_per_bucket: usize,
    /// Match length at which the search stops looking at further slots.
    pub enough: usize,
}

/// Fewest buckets a table is created with.
pub const MIN_BUCKETS: usize = 64;

/// Index over the source region, populated before the target is scanned.
pub const SOURCE_HASH: HashConfig = HashConfig {
    name: "source",
    key_size: 8,
    step_size: 4,
    slots_per_bucket: 4,
    enough: 256,
};

/// Index over target bytes already scanned, for copies within the target.
pub const TARGET_HASH: HashConfig = HashConfig {
    name: "target",
    key_size: 4,
    step_size: 1,
    slots_per_bucket: 4,
    enough: 64,
};

impl HashConfig {
    /// Bucket count for a region of `capacity` bytes: roughly one indexed
    /// position per slot.
    pub fn num_buckets(&self, capacity: usize) -> usize {
        (capacity / (self.step_size * self.slots_per_bucket)).max(MIN_BUCKETS)
    }
}
