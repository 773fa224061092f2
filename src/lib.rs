// Library interface for the optract gossip node
// This allows tests and external consumers to drive the pipeline directly

pub mod config;
pub mod codec;
pub mod record;
pub mod crypto;
pub mod error;
pub mod transport;
pub mod gossip;
pub mod filter;
pub mod router;
pub mod pool;
pub mod epoch;
pub mod storage;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod node;

pub use codec::{CodecError, Fields, Schema};
pub use crypto::{EcdsaVerifier, Verifier};
pub use error::Rejection;
pub use node::{Capabilities, NodeEvent, NodeHandle, Settlement, Stats};
pub use pool::{EpochId, PendingPool, PoolSnapshot};
pub use record::{Account, OrdinaryRecord, PendingRecord, Record, Signature, SummaryRecord};
pub use storage::{ContentStore, MemoryStore};
pub use transport::{Envelope, Inbound, PeerIdentity, SenderInfo, Transport, TransportEvent};
