#![allow(clippy::module_inception)]

mod bucket;
mod key;
mod stats;

pub use bucket::{Bucket, BucketState};
pub use key::BucketKey;
pub use stats::{BucketStats, BucketStatsMap};
