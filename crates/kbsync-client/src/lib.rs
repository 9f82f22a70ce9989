//! # kbsync-client
//!
//! Implementations of [`kbsync_core::ResourceRepository`]:
//!
//! - [`HttpRepository`] – the repository API over HTTP with a bearer token
//! - [`OfflineRepository`] – a self-contained mode over the mock dataset and
//!   the local membership store, with simulated latency
//! - [`ModeRepository`] – routes each call by its `online` flag
//!
//! [`auth`] holds the password-grant login and the persisted token file.

pub mod auth;
pub mod error;
pub mod http;
pub mod mock_data;
pub mod mode;
pub mod offline;

pub use auth::{fetch_access_token, Credentials, TokenStore};
pub use error::{ClientError, ClientResult};
pub use http::HttpRepository;
pub use mode::ModeRepository;
pub use offline::{OfflineRepository, OfflineSettings};
