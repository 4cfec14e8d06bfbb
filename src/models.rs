use std::{fmt, str::FromStr};

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::entities::{actor, country, genre, language};

const MAX_NAME_LEN: usize = 255;
const MAX_SCORE: f64 = 100.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MovieStatus {
    Released,
    #[serde(rename = "Post Production")]
    PostProduction,
    #[serde(rename = "In Production")]
    InProduction,
}

impl MovieStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MovieStatus::Released => "Released",
            MovieStatus::PostProduction => "Post Production",
            MovieStatus::InProduction => "In Production",
        }
    }
}

impl fmt::Display for MovieStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovieStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Released" => Ok(MovieStatus::Released),
            "Post Production" => Ok(MovieStatus::PostProduction),
            "In Production" => Ok(MovieStatus::InProduction),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: &'static str, min: f64, max: f64 },

    #[error("{field} must be a non-negative number")]
    Negative { field: &'static str },

    #[error("country must be a 2- or 3-letter code, got '{0}'")]
    CountryCode(String),

    #[error("unknown status '{0}'")]
    UnknownStatus(String),
}

fn check_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong { field, max: MAX_NAME_LEN });
    }
    Ok(value.to_string())
}

fn check_score(score: f64) -> Result<f64, ValidationError> {
    if !(0.0..=MAX_SCORE).contains(&score) {
        return Err(ValidationError::OutOfRange { field: "score", min: 0.0, max: MAX_SCORE });
    }
    Ok(score)
}

fn check_amount(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::Negative { field });
    }
    Ok(value)
}

fn check_country(code: &str) -> Result<String, ValidationError> {
    let code = code.trim().to_uppercase();
    if !(2..=3).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::CountryCode(code));
    }
    Ok(code)
}

fn check_names(field: &'static str, names: Vec<String>) -> Result<Vec<String>, ValidationError> {
    names.iter().map(|n| check_name(field, n)).collect()
}

/// Body of `POST /movies/`.
#[derive(Clone, Debug, Deserialize)]
pub struct MovieCreate {
    pub name: String,
    pub date: Date,
    pub score: f64,
    pub overview: String,
    pub status: MovieStatus,
    pub budget: f64,
    pub revenue: f64,
    pub country: String,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub languages: Vec<String>,
}

impl MovieCreate {
    /// Checks field rules and returns the payload with names trimmed and the
    /// country code upper-cased.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: check_name("name", &self.name)?,
            date: self.date,
            score: check_score(self.score)?,
            overview: self.overview,
            status: self.status,
            budget: check_amount("budget", self.budget)?,
            revenue: check_amount("revenue", self.revenue)?,
            country: check_country(&self.country)?,
            genres: check_names("genres", self.genres)?,
            actors: check_names("actors", self.actors)?,
            languages: check_names("languages", self.languages)?,
        })
    }
}

/// One mutable movie column with its new value.
#[derive(Clone, Debug, PartialEq)]
pub enum MovieField {
    Name(String),
    Date(Date),
    Score(f64),
    Overview(String),
    Status(MovieStatus),
    Budget(f64),
    Revenue(f64),
}

/// Body of `PATCH /movies/{id}/`. Absent (or null) fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MoviePatch {
    pub name: Option<String>,
    pub date: Option<Date>,
    pub score: Option<f64>,
    pub overview: Option<String>,
    pub status: Option<MovieStatus>,
    pub budget: Option<f64>,
    pub revenue: Option<f64>,
}

impl MoviePatch {
    pub fn into_fields(self) -> Result<Vec<MovieField>, ValidationError> {
        let mut fields = Vec::new();
        if let Some(name) = self.name {
            fields.push(MovieField::Name(check_name("name", &name)?));
        }
        if let Some(date) = self.date {
            fields.push(MovieField::Date(date));
        }
        if let Some(score) = self.score {
            fields.push(MovieField::Score(check_score(score)?));
        }
        if let Some(overview) = self.overview {
            fields.push(MovieField::Overview(overview));
        }
        if let Some(status) = self.status {
            fields.push(MovieField::Status(status));
        }
        if let Some(budget) = self.budget {
            fields.push(MovieField::Budget(check_amount("budget", budget)?));
        }
        if let Some(revenue) = self.revenue {
            fields.push(MovieField::Revenue(check_amount("revenue", revenue)?));
        }
        Ok(fields)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieListItem {
    pub id: i32,
    pub name: String,
    pub date: Date,
    pub score: f64,
    pub overview: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieList {
    pub movies: Vec<MovieListItem>,
    pub total_items: u64,
    pub total_pages: u64,
    pub prev_page: Option<String>,
    pub next_page: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Country {
    pub id: i32,
    pub code: String,
    pub name: Option<String>,
}

impl From<country::Model> for Country {
    fn from(row: country::Model) -> Self {
        Self { id: row.id, code: row.code, name: row.name }
    }
}

/// Genre, actor, or language as rendered inside a movie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Named {
    pub id: i32,
    pub name: String,
}

impl From<genre::Model> for Named {
    fn from(row: genre::Model) -> Self {
        Self { id: row.id, name: row.name }
    }
}

impl From<actor::Model> for Named {
    fn from(row: actor::Model) -> Self {
        Self { id: row.id, name: row.name }
    }
}

impl From<language::Model> for Named {
    fn from(row: language::Model) -> Self {
        Self { id: row.id, name: row.name }
    }
}

/// A movie with its country and many-to-many relations resolved.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieDetail {
    pub id: i32,
    pub name: String,
    pub date: Date,
    pub score: f64,
    pub overview: String,
    pub status: MovieStatus,
    pub budget: f64,
    pub revenue: f64,
    pub country: Country,
    pub genres: Vec<Named>,
    pub actors: Vec<Named>,
    pub languages: Vec<Named>,
}
