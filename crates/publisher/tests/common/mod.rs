pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{PublishFixture, seeded_bytes};
#[allow(unused_imports)]
pub use mocks::{CountingObserver, InstrumentedBackend};
