use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Placeholder MovieLens uses for a movie without genres
const NO_GENRES: &str = "(no genres listed)";

/// A catalog entry. `item_id` is the key used across the whole system
///
/// The external ids come from an optional links table and stay `None` when
/// no table was loaded or it has no row for the movie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub item_id: i64,
    pub title: String,
    pub genres: BTreeSet<String>,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub tmdb_id: Option<i64>,
}

impl Movie {
    /// Creates a movie from a `|`-separated genre column
    pub fn new(item_id: i64, title: impl Into<String>, genres: &str) -> Self {
        Self {
            item_id,
            title: title.into(),
            genres: parse_genres(genres),
            imdb_id: None,
            tmdb_id: None,
        }
    }

    pub fn with_link(mut self, link: &MovieLink) -> Self {
        self.imdb_id = link.imdb_id.clone();
        self.tmdb_id = link.tmdb_id;
        self
    }
}

/// External database ids for one movie, as listed in `links.csv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieLink {
    pub item_id: i64,
    /// Kept as text: IMDb ids are zero-padded
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<i64>,
}

/// Splits a `Comedy|Drama` style genre column into a set
pub fn parse_genres(raw: &str) -> BTreeSet<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|g| !g.is_empty() && *g != NO_GENRES)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_movie_parses_genres() {
        let movie = Movie::new(1, "Toy Story (1995)", "Adventure|Animation|Children");
        assert_eq!(movie.item_id, 1);
        assert_eq!(movie.title, "Toy Story (1995)");
        assert_eq!(movie.genres.len(), 3);
        assert!(movie.genres.contains("Animation"));
    }

    #[test]
    fn test_no_genres_listed_is_empty() {
        let movie = Movie::new(9, "Obscure Short (2015)", "(no genres listed)");
        assert!(movie.genres.is_empty());
    }

    #[test]
    fn test_with_link_sets_external_ids() {
        let link = MovieLink {
            item_id: 1,
            imdb_id: Some("0114709".to_string()),
            tmdb_id: Some(862),
        };
        let movie = Movie::new(1, "Toy Story (1995)", "Animation").with_link(&link);

        assert_eq!(movie.imdb_id.as_deref(), Some("0114709"));
        assert_eq!(movie.tmdb_id, Some(862));
    }

    #[test]
    fn test_duplicate_genres_collapse() {
        assert_eq!(parse_genres("Drama|Drama|Comedy").len(), 2);
    }
}
