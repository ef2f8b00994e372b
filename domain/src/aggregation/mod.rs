//! Vote aggregation.
//!
//! The engine never patches a view incrementally. After any change it calls
//! [`hydrate::hydrate_session`] with the authoritative current lists, which
//! makes the result correct under out-of-order or duplicate delivery.

pub mod hydrate;
pub mod view;

pub use hydrate::{SessionInputs, hydrate_session, sort_sessions, tally};
pub use view::{HydratedChoice, HydratedOption, SessionView};
