pub mod actor;
pub mod country;
pub mod genre;
pub mod language;
pub mod movie;
pub mod movie_actor;
pub mod movie_genre;
pub mod movie_language;
