//! Shared HTTP plumbing reused by every LLM provider client and every direct-API client.
//!
//! Grounded in the teacher's `cloudllm::clients::common`: one pooled [`reqwest::Client`]
//! shared process-wide instead of one per request, tuned the same way (idle pool timeout,
//! keepalive, connect/read timeouts).

use std::time::Duration;

use lazy_static::lazy_static;

lazy_static! {
    /// Shared HTTP client with persistent connection pooling.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = {
        reqwest::ClientBuilder::new()
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build shared HTTP client")
    };
}

/// Borrow the lazily initialized shared [`reqwest::Client`].
pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}
