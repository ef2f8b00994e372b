//! Document store adapters.

mod fixture;
mod memory;

pub use fixture::{FixtureError, MeetingFixture, StoreFixture};
pub use memory::MemoryDocumentStore;
