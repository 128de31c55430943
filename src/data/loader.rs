use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use crate::{
    error::{AppError, AppResult},
    models::{Movie, MovieLink, Rating},
};

/// Row of a MovieLens `movies.csv`
#[derive(Debug, Deserialize)]
struct MovieRecord {
    #[serde(rename = "movieId")]
    movie_id: i64,
    title: String,
    #[serde(default)]
    genres: String,
}

/// Row of a MovieLens `ratings.csv`
#[derive(Debug, Deserialize)]
struct RatingRecord {
    #[serde(rename = "userId")]
    user_id: i64,
    #[serde(rename = "movieId")]
    movie_id: i64,
    rating: f64,
    #[serde(default)]
    timestamp: Option<i64>,
}

/// Row of a MovieLens `links.csv`
#[derive(Debug, Deserialize)]
struct LinkRecord {
    #[serde(rename = "movieId")]
    movie_id: i64,
    #[serde(rename = "imdbId", default)]
    imdb_id: Option<String>,
    #[serde(rename = "tmdbId", default)]
    tmdb_id: Option<i64>,
}

/// The joined catalog and ratings every other stage is computed from
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub movies: Vec<Movie>,
    pub ratings: Vec<Rating>,
}

impl Dataset {
    /// Loads and joins the ratings and movies tables from disk
    pub fn load(ratings_path: impl AsRef<Path>, movies_path: impl AsRef<Path>) -> AppResult<Self> {
        let ratings_path = ratings_path.as_ref();
        let movies_path = movies_path.as_ref();

        tracing::info!(
            ratings = %ratings_path.display(),
            movies = %movies_path.display(),
            "Loading dataset"
        );

        let movies = read_movies(std::fs::File::open(movies_path)?)?;
        let ratings = read_ratings(std::fs::File::open(ratings_path)?)?;

        Self::from_parts(movies, ratings)
    }

    /// Reads a links table from disk and attaches it to the catalog
    pub fn with_links_file(self, links_path: impl AsRef<Path>) -> AppResult<Self> {
        let links_path = links_path.as_ref();
        tracing::info!(links = %links_path.display(), "Loading external movie ids");
        let links = read_links(std::fs::File::open(links_path)?)?;
        self.with_links(links)
    }

    /// Fills in each catalogued movie's external ids
    ///
    /// Links for movies outside the catalog are ignored. A movie listed twice
    /// is a dataset error.
    pub fn with_links(mut self, links: Vec<MovieLink>) -> AppResult<Self> {
        let mut by_movie: HashMap<i64, MovieLink> = HashMap::with_capacity(links.len());
        for link in links {
            let item_id = link.item_id;
            if by_movie.insert(item_id, link).is_some() {
                return Err(AppError::Dataset(format!(
                    "Duplicate links for movie {}",
                    item_id
                )));
            }
        }

        let total = by_movie.len();
        let mut linked = 0usize;
        self.movies = self
            .movies
            .into_iter()
            .map(|movie| match by_movie.get(&movie.item_id) {
                Some(link) => {
                    linked += 1;
                    movie.with_link(link)
                }
                None => movie,
            })
            .collect();

        if linked < total {
            tracing::warn!(
                ignored = total - linked,
                "Ignored links for movies missing from the catalog"
            );
        }
        tracing::info!(linked, movies = self.movies.len(), "External ids attached");

        Ok(self)
    }

    /// Validates the catalog and keeps only ratings for catalogued movies
    ///
    /// Ratings that reference an unknown movie are dropped, the way an inner
    /// join on the movie id would drop them.
    pub fn from_parts(movies: Vec<Movie>, ratings: Vec<Rating>) -> AppResult<Self> {
        let mut known = HashSet::with_capacity(movies.len());
        for movie in &movies {
            if !known.insert(movie.item_id) {
                return Err(AppError::Dataset(format!(
                    "Duplicate movie id {} in catalog",
                    movie.item_id
                )));
            }
        }

        if let Some(bad) = ratings.iter().find(|r| !r.rating.is_finite()) {
            return Err(AppError::Dataset(format!(
                "Non-finite rating for user {} and movie {}",
                bad.user_id, bad.item_id
            )));
        }

        let total = ratings.len();
        let ratings: Vec<Rating> = ratings
            .into_iter()
            .filter(|r| known.contains(&r.item_id))
            .collect();

        if ratings.len() < total {
            tracing::warn!(
                dropped = total - ratings.len(),
                "Dropped ratings for movies missing from the catalog"
            );
        }

        tracing::info!(
            movies = movies.len(),
            ratings = ratings.len(),
            "Dataset ready"
        );

        Ok(Self { movies, ratings })
    }
}

/// Parses a `movieId,title,genres` table
pub fn read_movies<R: Read>(reader: R) -> AppResult<Vec<Movie>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut movies = Vec::new();

    for record in reader.deserialize::<MovieRecord>() {
        let record = record?;
        movies.push(Movie::new(record.movie_id, record.title, &record.genres));
    }

    Ok(movies)
}

/// Parses a `movieId,imdbId,tmdbId` table; either id may be blank
pub fn read_links<R: Read>(reader: R) -> AppResult<Vec<MovieLink>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut links = Vec::new();

    for record in reader.deserialize::<LinkRecord>() {
        let record = record?;
        links.push(MovieLink {
            item_id: record.movie_id,
            imdb_id: record.imdb_id.filter(|id| !id.is_empty()),
            tmdb_id: record.tmdb_id,
        });
    }

    Ok(links)
}

/// Parses a `userId,movieId,rating[,timestamp]` table
pub fn read_ratings<R: Read>(reader: R) -> AppResult<Vec<Rating>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut ratings = Vec::new();

    for record in reader.deserialize::<RatingRecord>() {
        let record = record?;
        ratings.push(Rating {
            user_id: record.user_id,
            item_id: record.movie_id,
            rating: record.rating,
            timestamp: record.timestamp,
        });
    }

    Ok(ratings)
}
