use crate::pow::CancelToken;
use crate::{digest, meets_difficulty, ChainConfig, ChainError};
use rayon::prelude::*;
use tracing::info;

/// Searches the nonce space in parallel until any worker's digest meets the
/// configured difficulty. Rayon splits the range across threads and the
/// first hit wins, so the returned nonce may differ run to run; the
/// resulting `(nonce, hash)` pair always satisfies the difficulty, which is
/// all the chain invariants require. Cancellation makes every worker bail
/// on its next attempt.
pub fn mine_parallel(
    index: u64,
    payload: &str,
    previous_hash: &str,
    config: &ChainConfig,
    cancel: &CancelToken,
) -> Result<(u64, String), ChainError> {
    let upper = config.iteration_cap.unwrap_or(u64::MAX);

    let found = (0u64..upper).into_par_iter().find_any(|nonce| {
        if cancel.is_cancelled() {
            // Treat as a hit to stop the search; validity is re-checked below.
            return true;
        }
        let hash = digest(index, payload, *nonce, previous_hash);
        meets_difficulty(&hash, config.difficulty)
    });

    match found {
        Some(nonce) => {
            let hash = digest(index, payload, nonce, previous_hash);
            if meets_difficulty(&hash, config.difficulty) {
                info!(index, nonce, %hash, "mined block (parallel)");
                Ok((nonce, hash))
            } else {
                Err(ChainError::Cancelled {
                    index,
                    attempts: nonce,
                })
            }
        }
        None => Err(ChainError::Cancelled {
            index,
            attempts: upper,
        }),
    }
}
