pub mod loader;

pub use loader::{read_links, read_movies, read_ratings, Dataset};
