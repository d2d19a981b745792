pub mod fakes;

pub use fakes::{boostable_bosses_body, wait_until, RecordingTransport};
pub use test_harness::TestHarness;
