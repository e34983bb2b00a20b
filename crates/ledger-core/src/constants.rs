pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
pub const BLOCK_REWARD: u64 = 50;
/// `previous_hash` carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
/// How often the sequential search checks for cancellation and logs progress.
pub const SEARCH_CHECK_INTERVAL: u64 = 1 << 16;
