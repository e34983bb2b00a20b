use crate::{error::MineError, pow::meets_difficulty, Block};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared flag that asks a running proof-of-work search to stop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Searches nonces in parallel until the block digest has at least `difficulty`
/// leading zero hex symbols, then writes the winning nonce into `block`.
/// Rayon splits the nonce range across threads, so the nonce found is not
/// necessarily the smallest one.
pub fn search_parallel(
    block: &mut Block,
    difficulty: u32,
    cancel: Option<&CancelToken>,
) -> Result<u64, MineError> {
    let cancelled = || cancel.is_some_and(CancelToken::is_cancelled);
    if cancelled() {
        return Err(MineError::Cancelled {
            index: block.index,
            attempts: 0,
        });
    }

    // Every worker clones this template once and only varies the nonce.
    let template = block.clone();
    let attempts = AtomicU64::new(0);

    let found = (0u64..u64::MAX)
        .into_par_iter()
        .map_init(
            || template.clone(),
            |candidate, nonce| {
                candidate.nonce = nonce;
                attempts.fetch_add(1, Ordering::Relaxed);
                (nonce, meets_difficulty(&candidate.digest(), difficulty))
            },
        )
        .find_any(|&(_, ok)| ok || cancelled());

    let attempts = attempts.load(Ordering::Relaxed);
    match found {
        Some((nonce, true)) => {
            block.nonce = nonce;
            info!(index = block.index, nonce, attempts, "parallel search found nonce");
            Ok(nonce)
        }
        _ => {
            debug!(index = block.index, attempts, "parallel search cancelled");
            Err(MineError::Cancelled {
                index: block.index,
                attempts,
            })
        }
    }
}
