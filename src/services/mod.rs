pub mod recommendations;

pub use recommendations::Recommender;
