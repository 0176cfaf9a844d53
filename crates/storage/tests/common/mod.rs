pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{seeded_bytes, tile_key};
#[allow(unused_imports)]
pub use mocks::InstrumentedBackend;
