//! Shared builders and fakes for unit tests.

mod fixtures;
mod stream;
mod temp;

pub use fixtures::{ReleaseFeedBuilder, ReleaseMetadataBuilder};
pub use stream::ChunkedReader;
pub use temp::TestContext;
