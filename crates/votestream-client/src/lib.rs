//! votestream-client — network side of the live voting engine.
//!
//! Opens the session's event stream over HTTP, feeds body chunks into a
//! [`votestream_core::StreamSession`], and publishes tallies, per-unit
//! status and connection state to any number of readers.
//!
//! # Quick Start
//!
//! ```no_run
//! # async fn example() -> Result<(), votestream_client::ClientError> {
//! use votestream_client::{EngineConfig, VoteStreamEngine};
//!
//! let config = EngineConfig::from_file("votestream.yaml")?;
//! let handle = VoteStreamEngine::new(&config)?.connect("TOKEN").await?;
//! let mut status = handle.connection();
//! status.changed().await.ok();
//! println!("{}", status.borrow().state);
//! handle.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod policy;
pub mod transport;

pub use config::{load_file, DirectoryConfig, EngineConfig, ReconnectConfig};
pub use directory::{load_roster, parse_list, HttpSessionDirectory, Roster, SessionDirectory, StaticDirectory};
pub use engine::{StreamHandle, VoteStreamEngine};
pub use error::ClientError;
pub use policy::{BackoffConfig, ExponentialBackoff, NoReconnect, ReconnectPolicy};
pub use transport::{ConnectionEnd, SseTransport, StreamObserver};
