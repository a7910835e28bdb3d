use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod constants;
pub mod mine;

pub use constants::{
    DEFAULT_DIFFICULTY, GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH, HASH_HEX_SIZE,
};

/// One mined block. Immutable once built; `hash` is the SHA-256 digest of
/// the other four fields and `previous_hash` links it to the prior block
/// by value (`"0"` for the genesis block).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub payload: String,
    pub nonce: u64,
    pub hash: String,
    pub previous_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("difficulty {difficulty} exceeds the {max} hex characters of a digest")]
    DifficultyTooLarge { difficulty: usize, max: usize },
    #[error("mining block {index} cancelled after {attempts} nonce attempts")]
    Cancelled { index: u64, attempts: u64 },
    #[error("block {index}: previous_hash does not match the prior block's hash")]
    BrokenLink { index: u64 },
    #[error("block {index}: stored hash does not match its recomputed digest")]
    HashMismatch { index: u64 },
    #[error("block {index}: hash does not meet difficulty {difficulty}")]
    DifficultyNotMet { index: u64, difficulty: usize },
    #[error("genesis block previous_hash is not the \"0\" sentinel")]
    BadGenesis,
}

/// Mining parameters, threaded explicitly through the miner and builder.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    /// Required count of leading `'0'` hex characters in a valid hash.
    pub difficulty: usize,
    /// Upper bound on nonces tried per block, `None` for unbounded search.
    pub iteration_cap: Option<u64>,
}

impl ChainConfig {
    /// Rejects difficulties no digest can satisfy, so an impossible target
    /// fails here instead of spinning forever in the miner.
    pub fn new(difficulty: usize) -> Result<Self, ChainError> {
        if difficulty > HASH_HEX_SIZE {
            return Err(ChainError::DifficultyTooLarge {
                difficulty,
                max: HASH_HEX_SIZE,
            });
        }
        Ok(Self {
            difficulty,
            iteration_cap: None,
        })
    }

    pub fn with_iteration_cap(mut self, cap: u64) -> Self {
        self.iteration_cap = Some(cap);
        self
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            iteration_cap: None,
        }
    }
}

/// SHA-256 over the delimiter-free concatenation of the decimal index, the
/// payload, the decimal nonce, and the previous-hash string, as lowercase
/// hex. Field boundaries are ambiguous under this canonicalization
/// (payload "1" + nonce 23 serializes like payload "12" + nonce 3); kept
/// as-is so digests stay bit-for-bit stable.
pub fn digest(index: u64, payload: &str, nonce: u64, previous_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(itoa(index));
    hasher.update(payload.as_bytes());
    hasher.update(itoa(nonce));
    hasher.update(previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}

fn itoa(n: u64) -> Vec<u8> {
    n.to_string().into_bytes()
}

/// True iff the first `difficulty` hex characters of `hash` are `'0'`.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

pub mod pow {
    use super::{digest, meets_difficulty, ChainConfig, ChainError};
    use crate::constants::CANCEL_POLL_INTERVAL;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tracing::debug;

    /// Shared flag a caller can set to abort an in-flight nonce search.
    /// Clones observe the same flag.
    #[derive(Clone, Debug, Default)]
    pub struct CancelToken(Arc<AtomicBool>);

    impl CancelToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.0.store(true, Ordering::Relaxed);
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::Relaxed)
        }
    }

    /// Sequential nonce search from 0 upward until the digest meets the
    /// configured difficulty. Polls the cancel token periodically and
    /// honors the config's iteration cap, so the search is never an
    /// uninterruptible loop. Expected attempts grow as 16^difficulty.
    pub fn mine(
        index: u64,
        payload: &str,
        previous_hash: &str,
        config: &ChainConfig,
        cancel: &CancelToken,
    ) -> Result<(u64, String), ChainError> {
        let mut nonce: u64 = 0;
        loop {
            if nonce % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(ChainError::Cancelled {
                    index,
                    attempts: nonce,
                });
            }
            if let Some(cap) = config.iteration_cap {
                if nonce >= cap {
                    return Err(ChainError::Cancelled {
                        index,
                        attempts: nonce,
                    });
                }
            }
            let hash = digest(index, payload, nonce, previous_hash);
            if meets_difficulty(&hash, config.difficulty) {
                debug!(index, nonce, %hash, "found valid nonce");
                return Ok((nonce, hash));
            }
            nonce += 1;
        }
    }
}

pub mod chain {
    use super::{digest, meets_difficulty, Block, ChainConfig, ChainError};
    use crate::constants::{GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH};
    use crate::pow::{mine, CancelToken};
    use serde::{Deserialize, Serialize};
    use std::time::{Duration, Instant};
    use tracing::info;

    /// An ordered, append-only-then-frozen sequence of linked blocks. The
    /// rendering side only ever reads this.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Chain {
        blocks: Vec<Block>,
    }

    impl Chain {
        pub fn len(&self) -> usize {
            self.blocks.len()
        }

        pub fn is_empty(&self) -> bool {
            self.blocks.is_empty()
        }

        pub fn get(&self, index: usize) -> Option<&Block> {
            self.blocks.get(index)
        }

        pub fn blocks(&self) -> &[Block] {
            &self.blocks
        }

        pub fn iter(&self) -> std::slice::Iter<'_, Block> {
            self.blocks.iter()
        }

        /// Re-checks every chain invariant: the genesis sentinel, the
        /// hash linkage between consecutive blocks, each stored hash
        /// against a recomputed digest, and the difficulty target.
        /// Cheap relative to mining; returns the first violation found.
        pub fn verify(&self, config: &ChainConfig) -> Result<(), ChainError> {
            for (i, block) in self.blocks.iter().enumerate() {
                if i == 0 {
                    if block.previous_hash != GENESIS_PREVIOUS_HASH {
                        return Err(ChainError::BadGenesis);
                    }
                } else if block.previous_hash != self.blocks[i - 1].hash {
                    return Err(ChainError::BrokenLink { index: block.index });
                }
                let recomputed =
                    digest(block.index, &block.payload, block.nonce, &block.previous_hash);
                if recomputed != block.hash {
                    return Err(ChainError::HashMismatch { index: block.index });
                }
                if !meets_difficulty(&block.hash, config.difficulty) {
                    return Err(ChainError::DifficultyNotMet {
                        index: block.index,
                        difficulty: config.difficulty,
                    });
                }
            }
            Ok(())
        }
    }

    impl<'a> IntoIterator for &'a Chain {
        type Item = &'a Block;
        type IntoIter = std::slice::Iter<'a, Block>;

        fn into_iter(self) -> Self::IntoIter {
            self.blocks.iter()
        }
    }

    /// A finished build: the chain plus the wall-clock time spent mining.
    #[derive(Clone, Debug)]
    pub struct BuildReport {
        pub chain: Chain,
        pub elapsed: Duration,
    }

    /// How each block's nonce search runs. Blocks are always mined one
    /// after another either way; `Parallel` only races workers over the
    /// nonce space within a single block.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub enum MineStrategy {
        #[default]
        Sequential,
        Parallel,
    }

    /// Mines `block_count` linked blocks. Each block's search starts only
    /// once the prior block's hash is known, so blocks cannot be produced
    /// out of order. A cancelled or capped search fails the whole build; a
    /// partial chain is never returned.
    pub fn build_chain_with(
        block_count: u64,
        config: &ChainConfig,
        cancel: &CancelToken,
        strategy: MineStrategy,
    ) -> Result<BuildReport, ChainError> {
        let mine_one: fn(
            u64,
            &str,
            &str,
            &ChainConfig,
            &CancelToken,
        ) -> Result<(u64, String), ChainError> = match strategy {
            MineStrategy::Sequential => mine,
            MineStrategy::Parallel => crate::mine::mine_parallel,
        };

        let start = Instant::now();
        let mut chain = Chain::default();
        if block_count == 0 {
            return Ok(BuildReport {
                chain,
                elapsed: start.elapsed(),
            });
        }

        let (nonce, hash) = mine_one(0, GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH, config, cancel)?;
        info!(index = 0, nonce, %hash, "mined genesis block");
        chain.blocks.push(Block {
            index: 0,
            payload: GENESIS_PAYLOAD.to_string(),
            nonce,
            hash,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        });

        for i in 1..block_count {
            let payload = format!("Block {i} Data");
            let previous_hash = chain.blocks[(i - 1) as usize].hash.clone();
            let (nonce, hash) = mine_one(i, &payload, &previous_hash, config, cancel)?;
            info!(index = i, nonce, %hash, "mined block");
            chain.blocks.push(Block {
                index: i,
                payload,
                nonce,
                hash,
                previous_hash,
            });
        }

        let elapsed = start.elapsed();
        info!(blocks = chain.len(), ?elapsed, "chain built");
        Ok(BuildReport { chain, elapsed })
    }

    /// Sequential build, the reference behavior.
    pub fn build_chain(
        block_count: u64,
        config: &ChainConfig,
        cancel: &CancelToken,
    ) -> Result<BuildReport, ChainError> {
        build_chain_with(block_count, config, cancel, MineStrategy::Sequential)
    }

    /// Builds with the reference difficulty and no iteration cap.
    pub fn build_chain_default(block_count: u64) -> Result<BuildReport, ChainError> {
        build_chain(block_count, &ChainConfig::default(), &CancelToken::new())
    }
}
