//! Issue state & synchronization: the local cache over the remote
//! document store, the durable offline queue, the per-user vote ledger,
//! the pure filter/sort pipeline, and the map marker projection.

pub mod cache;
pub mod filter;
pub mod map;
pub mod queue;
pub mod service;
pub mod store;
pub mod votes;

pub use cache::IssueCache;
pub use filter::{IssueFilter, SortKey};
pub use map::{cluster, markers, status_color, to_geojson, Cluster, MapFeature, Marker};
pub use queue::{DrainReport, OfflineQueue, PendingMutation, QueueEntry, MAX_SYNC_ATTEMPTS};
pub use service::{IssueService, NewIssue};
pub use store::{HttpIssueStore, IssuePatch, IssueStore, MemoryIssueStore};
pub use votes::{VoteChoice, VoteDelta, VoteLedger};
