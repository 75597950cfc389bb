//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TEST_ACCOUNT};
//!
//! #[tokio::test]
//! async fn test_connect() {
//!     let server = TestServer::spawn().await;
//!     let mut ws = server.connect_ws(None).await;
//! }
//! ```

#![allow(dead_code)]

mod fake_lastfm;
mod server;

pub use fake_lastfm::FakeLastFm;
pub use server::{wait_for_message, TestServer, WsStream};

/// Account every test connection defaults to.
pub const TEST_ACCOUNT: &str = "test-listener";

/// How long to wait for an expected WebSocket message.
pub const MESSAGE_TIMEOUT_MS: u64 = 5000;
