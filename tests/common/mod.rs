#![allow(dead_code)]

pub use concierge_test_utils::builders;
pub use concierge_test_utils::{eventually, init_tracing, with_timeout, RecordingSink};
