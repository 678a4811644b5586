//! Funnel state machine.
//!
//! - [`table`]: the `step × action → target` table and its structural checks
//! - [`reducer`]: [`VaultReducerState`], [`VaultAction`] and the pure reducer
//!
//! The reducer never talks to storage. [`crate::VaultEngine`] mirrors each
//! applied transition into the session store.

mod reducer;
mod table;

pub use reducer::{FunnelUpdate, VaultAction, VaultReducerState};
pub use table::{ActionKind, TableError, Target, TransitionTable};
