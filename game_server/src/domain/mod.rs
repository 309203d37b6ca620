// Domain layer: authoritative rules, per-connection sync state and hit-time history.

pub mod aoi;
pub mod delta;
pub mod lag_comp;
pub mod spawn;
pub mod state;
pub mod systems;
pub mod validation;

pub use delta::{ConnectionSyncState, PendingSync, SyncCache};
pub use lag_comp::{LagCompensator, Rewound};
pub use state::{ConnectionId, ConnectionState};
pub use validation::{CommandLimits, CommandRejection, RejectionTracker, validate_command};
