mod enclosure;
mod feed;

pub use enclosure::{Screening, Unplayable, screen_enclosures};
pub use feed::{FeedResult, ItemFailure, normalize};
