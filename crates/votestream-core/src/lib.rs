//! votestream-core — the pure half of the live voting engine.
//!
//! # Architecture
//!
//! ```text
//! body chunks → EventFrameParser → StreamEvent ─┬─► VoteLedger ─┬─► TallyAggregator     (tally)
//!                                               │               └─► UnitStatusResolver   (units)
//!                                               └─► ConnectionLifecycle / HeartbeatMonitor
//! ```
//!
//! Nothing here does I/O. [`StreamSession`] ties the pieces together for a
//! single connection; `votestream-client` owns the network side.

pub mod error;
pub mod event;
pub mod frame;
pub mod heartbeat;
pub mod ledger;
pub mod lifecycle;
pub mod session;
pub mod tally;
pub mod types;
pub mod units;
pub mod wire;

pub use error::FrameError;
pub use event::StreamEvent;
pub use frame::{EventFrameParser, Frame};
pub use heartbeat::HeartbeatMonitor;
pub use ledger::VoteLedger;
pub use lifecycle::ConnectionLifecycle;
pub use session::{IngestOutcome, StreamSession};
pub use types::{
    ConnectionState, ConnectionStatus, StreamMetrics, TallyEntry, UnitRecord, UnitVoteStatus,
    VoteRecord, VotingOption,
};
