use crate::config::{LedgerConfig, RewardPolicy};
use crate::error::{ChainViolation, ConfigError, MineError, TokenError, ViolationKind};
use crate::mine::{self, CancelToken};
use crate::token::TokenRegistry;
use crate::{pow, Block, Transaction};
use tracing::{debug, info, warn};

/// Chain, pending pool and token registry behind one owner. Nothing here is
/// synchronised internally: share it across threads only behind a single lock.
#[derive(Clone, Debug)]
pub struct Ledger {
    config: LedgerConfig,
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    tokens: TokenRegistry,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::from_valid_config(LedgerConfig::default())
    }
}

impl Ledger {
    /// Starts a chain holding only the genesis block.
    pub fn new(config: LedgerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: LedgerConfig) -> Self {
        let genesis = Block::genesis();
        info!(
            difficulty = config.difficulty,
            genesis = %genesis.fingerprint(),
            "ledger initialised"
        );
        Self {
            config,
            chain: vec![genesis],
            pending: Vec::new(),
            tokens: TokenRegistry::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn last_block(&self) -> &Block {
        // The genesis block is pushed on construction and nothing removes blocks.
        &self.chain[self.chain.len() - 1]
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    /// Queues a transaction for the next block. No validation is performed.
    pub fn submit_transaction(&mut self, transaction: Transaction) {
        debug!(?transaction, pending = self.pending.len() + 1, "transaction submitted");
        self.pending.push(transaction);
    }

    /// Mines the pending pool into a new block, blocking until a nonce is found.
    /// Returns `None` when there is nothing to mine.
    pub fn mine(&mut self, miner_address: &str) -> Option<&Block> {
        // Without a token the search cannot be cancelled, so this never errors.
        self.mine_block(miner_address, None).ok().flatten()
    }

    /// Like [`Ledger::mine`], but stops when `cancel` fires. A cancelled search
    /// puts its transactions back at the front of the pending pool.
    pub fn mine_with_cancel(
        &mut self,
        miner_address: &str,
        cancel: &CancelToken,
    ) -> Result<Option<&Block>, MineError> {
        self.mine_block(miner_address, Some(cancel))
    }

    fn mine_block(
        &mut self,
        miner_address: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<Option<&Block>, MineError> {
        if self.pending.is_empty() {
            debug!("pending pool empty, nothing to mine");
            return Ok(None);
        }

        let transactions = std::mem::take(&mut self.pending);
        let index = self.chain.len() as u64;
        let mut candidate = Block::new(index, self.last_block().fingerprint(), transactions);

        let mut reward = Some(Transaction::reward(miner_address, self.config.reward));
        if self.config.reward_policy == RewardPolicy::Strict {
            candidate.transactions.extend(reward.take());
        }

        let difficulty = self.config.difficulty;
        let found = if self.config.parallel {
            mine::search_parallel(&mut candidate, difficulty, cancel)
        } else {
            pow::search(&mut candidate, difficulty, cancel)
        };

        let nonce = match found {
            Ok(nonce) => nonce,
            Err(err) => {
                let mut restored = candidate.transactions;
                if reward.is_none() {
                    restored.pop();
                }
                restored.append(&mut self.pending);
                self.pending = restored;
                warn!(%err, pending = self.pending.len(), "mining aborted");
                return Err(err);
            }
        };

        let proven = candidate.fingerprint();
        candidate.transactions.extend(reward);
        info!(
            index,
            nonce,
            fingerprint = %proven,
            transactions = candidate.transactions.len(),
            miner = miner_address,
            "block mined"
        );
        self.chain.push(candidate);
        Ok(self.chain.last())
    }

    /// True when every block links to its predecessor's recomputed fingerprint
    /// and its own recomputed fingerprint meets the difficulty target.
    pub fn verify(&self) -> bool {
        match self.verify_detailed() {
            Ok(()) => true,
            Err(violation) => {
                warn!(%violation, "chain verification failed");
                false
            }
        }
    }

    /// Walks the chain from the first block after genesis and reports the
    /// lowest-index violation.
    pub fn verify_detailed(&self) -> Result<(), ChainViolation> {
        for (offset, pair) in self.chain.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = offset as u64 + 1;

            let expected = previous.fingerprint();
            if current.previous_hash != expected {
                return Err(ChainViolation {
                    index,
                    kind: ViolationKind::BrokenLink {
                        expected,
                        found: current.previous_hash.clone(),
                    },
                });
            }

            let digest = current.digest();
            if !pow::meets_difficulty(&digest, self.config.difficulty) {
                return Err(ChainViolation {
                    index,
                    kind: ViolationKind::InsufficientWork {
                        fingerprint: hex::encode(digest),
                    },
                });
            }
        }
        Ok(())
    }

    pub fn create_token(&mut self, name: &str, initial_supply: u64) -> Result<(), TokenError> {
        self.tokens.create(name, initial_supply)
    }

    pub fn mint(&mut self, name: &str, amount: u64, to: &str) -> Result<(), TokenError> {
        self.tokens.mint(name, amount, to)
    }

    pub fn burn(&mut self, name: &str, amount: u64, from: &str) -> Result<(), TokenError> {
        self.tokens.burn(name, amount, from)
    }
}
