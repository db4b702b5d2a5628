//! External price inputs: pool reserves and the oracle feed.
//!
//! The accumulator only sees the two traits below. `RpcClient` answers both
//! through `eth_call` against an EVM JSON-RPC endpoint, pinned to the block
//! of the observation being processed.

pub mod abi;
pub mod errors;
pub mod rpc;

pub use errors::SourceError;
pub use rpc::RpcClient;

use model::Address;
use num_bigint::{BigInt, BigUint};

/// Reads `(reserve0, reserve1)` of a constant-product pair.
#[async_trait::async_trait]
pub trait PoolReserveSource: Send + Sync {
    async fn get_reserves(
        &self,
        pair: &Address,
        block_height: u64,
    ) -> Result<(BigUint, BigUint), SourceError>;
}

/// Reads the latest answer of an 8-decimal aggregator feed.
#[async_trait::async_trait]
pub trait OracleFeedSource: Send + Sync {
    async fn latest_answer(&self, feed: &Address, block_height: u64) -> Result<BigInt, SourceError>;
}
