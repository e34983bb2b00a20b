use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mine;
pub mod token;

pub use config::{LedgerConfig, RewardPolicy};
pub use error::{ChainViolation, ConfigError, MineError, TokenError, ViolationKind};
pub use ledger::Ledger;
pub use mine::CancelToken;
pub use token::{Token, TokenRegistry};

pub type Hash = [u8; 32];

/// A pending or mined ledger entry. `Other` carries records with no fixed
/// schema; its fields are hashed as-is, so they must serialize canonically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    Transfer {
        from: String,
        to: String,
        amount: u64,
    },
    Reward {
        to: String,
        amount: u64,
    },
    Other {
        fields: BTreeMap<String, Value>,
    },
}

impl Transaction {
    pub fn transfer(from: impl Into<String>, to: impl Into<String>, amount: u64) -> Self {
        Transaction::Transfer {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }

    pub fn reward(to: impl Into<String>, amount: u64) -> Self {
        Transaction::Reward {
            to: to.into(),
            amount,
        }
    }

    /// JSON object with sorted keys, the form fed into the block digest.
    pub fn canonical(&self) -> Value {
        match self {
            Transaction::Transfer { from, to, amount } => json!({
                "amount": amount,
                "from": from,
                "to": to,
                "type": "transfer",
            }),
            Transaction::Reward { to, amount } => json!({
                "amount": amount,
                "to": to,
                "type": "reward",
            }),
            Transaction::Other { fields } => json!({
                "fields": fields,
                "type": "other",
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
    pub timestamp: u64,
    pub nonce: u64,
}

impl Block {
    /// Stamps the block with the current wall-clock time and a zero nonce.
    pub fn new(index: u64, previous_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        Self {
            index,
            previous_hash: previous_hash.into(),
            transactions,
            timestamp: now_millis(),
            nonce: 0,
        }
    }

    pub fn genesis() -> Self {
        Block::new(0, constants::GENESIS_PREVIOUS_HASH, vec![])
    }

    /// Compact JSON over every field, keys sorted at each level.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let transactions: Vec<Value> = self.transactions.iter().map(Transaction::canonical).collect();
        json!({
            "index": self.index,
            "nonce": self.nonce,
            "previous_hash": self.previous_hash,
            "timestamp": self.timestamp,
            "transactions": transactions,
        })
        .to_string()
        .into_bytes()
    }

    pub fn digest(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        out
    }

    /// Recomputed from the current field values on every call.
    pub fn fingerprint(&self) -> String {
        hex::encode(self.digest())
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        pow::meets_difficulty(&self.digest(), difficulty)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub mod pow {
    use super::{Block, Hash};
    use crate::constants::SEARCH_CHECK_INTERVAL;
    use crate::error::MineError;
    use crate::mine::CancelToken;
    use tracing::debug;

    /// Brute-force the nonce from zero until the block digest has at least
    /// `difficulty` leading zero hex symbols. Without a cancel token this only
    /// returns once a nonce is found.
    pub fn search(
        block: &mut Block,
        difficulty: u32,
        cancel: Option<&CancelToken>,
    ) -> Result<u64, MineError> {
        block.nonce = 0;
        let mut attempts = 0u64;
        loop {
            if attempts % SEARCH_CHECK_INTERVAL == 0 {
                if cancel.is_some_and(CancelToken::is_cancelled) {
                    return Err(MineError::Cancelled {
                        index: block.index,
                        attempts,
                    });
                }
                if attempts > 0 {
                    debug!(index = block.index, attempts, "proof-of-work search in progress");
                }
            }
            if meets_difficulty(&block.digest(), difficulty) {
                return Ok(block.nonce);
            }
            attempts += 1;
            block.nonce = block.nonce.wrapping_add(1);
        }
    }

    /// Leading zero symbols of the hex rendering of `hash`.
    pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }

    pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
        count_leading_zero_nibbles(hash) >= difficulty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashSet;

    fn sample_block() -> Block {
        let txs = vec![
            Transaction::transfer("Alice", "Bob", 10),
            Transaction::transfer("Bob", "Charlie", 5),
        ];
        let mut block = Block::new(1, "ab".repeat(32), txs);
        block.timestamp = 1_600_000_200_000; // Fix timestamp for test consistency
        block
    }

    #[test]
    fn leading_zero_nibbles_examples() {
        let mut h = [0u8; 32];
        assert_eq!(pow::count_leading_zero_nibbles(&h), 64);
        h[0] = 0x0F;
        assert_eq!(pow::count_leading_zero_nibbles(&h), 1);
        h[0] = 0x10;
        assert_eq!(pow::count_leading_zero_nibbles(&h), 0);
        h = [0u8; 32];
        h[1] = 0x80;
        assert_eq!(pow::count_leading_zero_nibbles(&h), 2);
        h[1] = 0x04;
        assert_eq!(pow::count_leading_zero_nibbles(&h), 3);
        assert!(pow::meets_difficulty(&h, 3));
        assert!(!pow::meets_difficulty(&h, 4));
    }

    #[test]
    fn nibble_count_matches_hex_rendering() {
        let block = sample_block();
        let zeros = block.fingerprint().chars().take_while(|c| *c == '0').count() as u32;
        assert_eq!(pow::count_leading_zero_nibbles(&block.digest()), zeros);
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.nonce, 0);
        assert!(genesis.transactions.is_empty());
        assert!(genesis.timestamp > 0);
    }

    #[test]
    fn canonical_bytes_sort_keys() {
        let block = sample_block();
        let text = String::from_utf8(block.canonical_bytes()).unwrap();
        let expected = format!(
            concat!(
                r#"{{"index":1,"nonce":0,"previous_hash":"{}","timestamp":1600000200000,"#,
                r#""transactions":[{{"amount":10,"from":"Alice","to":"Bob","type":"transfer"}},"#,
                r#"{{"amount":5,"from":"Bob","to":"Charlie","type":"transfer"}}]}}"#
            ),
            "ab".repeat(32)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn other_fields_hash_independent_of_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("memo".to_string(), json!("hi"));
        a.insert("gas".to_string(), json!(3));
        let mut b = BTreeMap::new();
        b.insert("gas".to_string(), json!(3));
        b.insert("memo".to_string(), json!("hi"));

        let mut block_a = sample_block();
        block_a.transactions = vec![Transaction::Other { fields: a }];
        let mut block_b = block_a.clone();
        block_b.transactions = vec![Transaction::Other { fields: b }];
        assert_eq!(block_a.fingerprint(), block_b.fingerprint());
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let block = sample_block();
        assert_eq!(block.fingerprint(), block.fingerprint());
        assert_eq!(block.fingerprint(), block.clone().fingerprint());
        assert_eq!(block.fingerprint().len(), constants::HASH_HEX_SIZE);
    }

    #[test]
    fn fingerprint_changes_with_nonce() {
        let mut block = sample_block();
        let hash1 = block.fingerprint();
        block.nonce += 1;
        assert_ne!(hash1, block.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_each_field() {
        let base = sample_block();
        let original = base.fingerprint();

        let mut b = base.clone();
        b.index = 2;
        assert_ne!(b.fingerprint(), original);

        let mut b = base.clone();
        b.previous_hash = "cd".repeat(32);
        assert_ne!(b.fingerprint(), original);

        let mut b = base.clone();
        b.timestamp += 1;
        assert_ne!(b.fingerprint(), original);

        let mut b = base.clone();
        b.transactions[1] = Transaction::transfer("Bob", "Charlie", 6);
        assert_ne!(b.fingerprint(), original);

        let mut b = base;
        b.transactions.swap(0, 1);
        assert_ne!(b.fingerprint(), original);
    }

    #[test]
    fn random_mutations_never_collide() {
        let mut rng = StdRng::seed_from_u64(42);
        let base = sample_block();
        let mut seen = HashSet::new();
        seen.insert(base.fingerprint());
        for i in 0..100u64 {
            let mut b = base.clone();
            match i % 3 {
                0 => b.nonce = rng.gen_range(1..u64::MAX),
                1 => b.previous_hash = hex::encode(rng.gen::<[u8; 32]>()),
                _ => b.transactions[0] = Transaction::transfer("Alice", "Bob", 1_000 + i),
            }
            assert!(seen.insert(b.fingerprint()), "collision at mutation {i}");
        }
    }

    #[test]
    fn search_finds_nonce_meeting_difficulty() {
        let mut block = sample_block();
        let nonce = pow::search(&mut block, 2, None).unwrap();
        assert_eq!(block.nonce, nonce);
        assert!(block.meets_difficulty(2));
        assert!(block.fingerprint().starts_with("00"));
    }

    #[test]
    fn search_returns_smallest_nonce() {
        let mut block = sample_block();
        let nonce = pow::search(&mut block, 2, None).unwrap();
        for n in 0..nonce {
            let mut probe = block.clone();
            probe.nonce = n;
            assert!(!probe.meets_difficulty(2));
        }
    }

    #[test]
    fn search_stops_when_cancelled() {
        let mut block = sample_block();
        let token = CancelToken::new();
        token.cancel();
        let err = pow::search(&mut block, constants::MAX_DIFFICULTY, Some(&token)).unwrap_err();
        assert_eq!(err, MineError::Cancelled { index: 1, attempts: 0 });
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::transfer("Alice", "Bob", 10);
        let json = serde_json::to_string(&tx).unwrap();
        let expected_json = r#"{"type":"transfer","from":"Alice","to":"Bob","amount":10}"#;
        assert_eq!(json, expected_json);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn other_transaction_roundtrips_through_serde() {
        let json = r#"{"type":"other","fields":{"memo":"airdrop","tags":[1,2]}}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        match &tx {
            Transaction::Other { fields } => assert_eq!(fields["memo"], json!("airdrop")),
            other => panic!("unexpected variant {other:?}"),
        }
        assert_eq!(tx.canonical()["type"], json!("other"));
    }

    #[test]
    fn block_serialization_example() {
        let block = sample_block();
        let json = serde_json::to_string(&block).unwrap();
        let deserialized: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, deserialized);
        assert_eq!(block.fingerprint(), deserialized.fingerprint());
    }
}
