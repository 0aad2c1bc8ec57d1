mod fetch;
mod parse;
mod raw;

pub use fetch::{fetch_feed, fetch_feed_bytes};
pub use parse::parse_feed;
pub use raw::{RawEnclosure, RawFeed, RawImage, RawItem, RawItunesItem, RawPerson};
