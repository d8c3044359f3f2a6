/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Create the database directory if it does not exist.
    pub create_if_missing: bool,
    /// Fail `open` on a corrupted log instead of dropping the bad tail.
    pub paranoid_checks: bool,
    /// Upper bound on the encoded size of one group commit.
    pub max_group_bytes: usize,
    /// A leader batch at most this large only waits for a little extra work.
    pub small_write_threshold: usize,
    /// How much extra work a small leader batch will take on.
    pub small_write_slack: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            create_if_missing: true,
            paranoid_checks: false,
            max_group_bytes: 1 << 20,
            small_write_threshold: 128 << 10,
            small_write_slack: 128 << 10,
        }
    }
}

/// Per-write durability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// If true, the log is synced to stable storage before the write is
    /// acknowledged. If false, a machine crash may lose the write, but a
    /// process crash alone will not, and a lost write is never partially
    /// applied.
    pub sync: bool,
}

impl WriteOptions {
    pub fn synced() -> Self {
        WriteOptions { sync: true }
    }
}
