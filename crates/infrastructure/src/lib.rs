//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_ranking_sources;
mod in_memory_lease_store;
mod in_memory_ranking_result_sink;
mod redis_lease_store;
mod redis_ranking_result_sink;

pub use http_ranking_sources::{HttpContentLister, HttpInteractionCountFetcher};
pub use in_memory_lease_store::InMemoryLeaseStore;
pub use in_memory_ranking_result_sink::InMemoryRankingResultSink;
pub use redis_lease_store::RedisLeaseStore;
pub use redis_ranking_result_sink::RedisRankingResultSink;
