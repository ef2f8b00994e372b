//! Live voting sync: subscription management, hydration and the view.

mod engine;
mod state;
mod view;

pub use engine::{VotingSyncEngine, VotingSyncHandle};
pub use state::VotingSync;
pub use view::{SyncError, VotingView};
