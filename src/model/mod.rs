mod episode;
mod podcast;

pub use episode::{Enclosure, Episode, ItunesEpisodeExt};
pub use podcast::{Author, Image, Podcast};
