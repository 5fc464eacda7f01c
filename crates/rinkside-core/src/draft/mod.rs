// Snake draft engine: order assignment, lifecycle, turn computation, picks,
// and roster materialization.

pub mod order;
pub mod pick;
pub mod roster;
pub mod state;
pub mod turn;

pub use order::DraftOrderEntry;
pub use pick::DraftPick;
pub use roster::RosterEntry;
pub use state::{Draft, DraftStatus};
pub use turn::Turn;
