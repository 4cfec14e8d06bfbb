//! Movie data access. Reads take any connection; writes take the request's
//! transaction by value and commit it before returning.

use jiff::civil::Date;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    SqlErr,
};
use tracing::{debug, info};

use crate::{
    entities::{actor, country, genre, language, movie, movie_actor, movie_genre, movie_language},
    models::{MovieCreate, MovieDetail, MovieField, MovieListItem, MovieStatus, Named},
    pagination::Pagination,
    reconcile::{CountryKey, NaturalKey, get_or_create},
};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The requested page holds no movies, whether it is out of range or the
    /// catalog is empty.
    #[error("No movies found.")]
    EmptyPage,

    #[error("A movie with the name '{name}' and release date '{date}' already exists.")]
    Conflict { name: String, date: Date },

    /// The store refused a patch, e.g. a unique index tripped.
    #[error("Invalid input data.")]
    InvalidInput(#[source] DbErr),

    #[error("movie {id} has an unreadable {column} column")]
    Corrupt { id: i32, column: &'static str },

    #[error(transparent)]
    Db(#[from] DbErr),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Newest first.
pub async fn list_movies<C: ConnectionTrait>(
    db: &C,
    page: Pagination,
) -> CatalogResult<Vec<MovieListItem>> {
    let rows = movie::Entity::find()
        .order_by_desc(movie::Column::Id)
        .offset(page.offset())
        .limit(page.limit())
        .all(db)
        .await?;

    if rows.is_empty() {
        return Err(CatalogError::EmptyPage);
    }

    rows.into_iter()
        .map(|row| -> CatalogResult<MovieListItem> {
            Ok(MovieListItem {
                id: row.id,
                date: parse_date(&row)?,
                name: row.name,
                score: row.score,
                overview: row.overview,
            })
        })
        .collect()
}

pub async fn count_movies<C: ConnectionTrait>(db: &C) -> CatalogResult<u64> {
    Ok(movie::Entity::find().count(db).await?)
}

pub async fn create_movie(
    txn: DatabaseTransaction,
    new: MovieCreate,
) -> CatalogResult<MovieDetail> {
    let date = new.date.to_string();

    let existing = movie::Entity::find()
        .filter(movie::Column::Name.eq(new.name.as_str()))
        .filter(movie::Column::Date.eq(date.as_str()))
        .count(&txn)
        .await?;
    if existing > 0 {
        return Err(CatalogError::Conflict { name: new.name, date: new.date });
    }

    let genre_ids = resolve_names::<genre::Entity, _>(&txn, &new.genres).await?;
    let actor_ids = resolve_names::<actor::Entity, _>(&txn, &new.actors).await?;
    let language_ids = resolve_names::<language::Entity, _>(&txn, &new.languages).await?;
    let country =
        get_or_create::<country::Entity, _>(&txn, &CountryKey::from_code(&new.country)).await?;

    let row = movie::ActiveModel {
        name: Set(new.name.clone()),
        date: Set(date),
        score: Set(new.score),
        overview: Set(new.overview),
        status: Set(new.status.as_str().to_string()),
        budget: Set(new.budget),
        revenue: Set(new.revenue),
        country_id: Set(country.id),
        ..Default::default()
    };
    let row = insert_movie(&txn, row, &new.name, new.date).await?;

    link(
        &txn,
        genre_ids
            .into_iter()
            .map(|genre_id| movie_genre::ActiveModel {
                movie_id: Set(row.id),
                genre_id: Set(genre_id),
            })
            .collect(),
    )
    .await?;
    link(
        &txn,
        actor_ids
            .into_iter()
            .map(|actor_id| movie_actor::ActiveModel {
                movie_id: Set(row.id),
                actor_id: Set(actor_id),
            })
            .collect(),
    )
    .await?;
    link(
        &txn,
        language_ids
            .into_iter()
            .map(|language_id| movie_language::ActiveModel {
                movie_id: Set(row.id),
                language_id: Set(language_id),
            })
            .collect(),
    )
    .await?;

    let detail = load_detail(&txn, row, Some(country)).await?;
    txn.commit().await?;

    info!(id = detail.id, name = %detail.name, date = %detail.date, "movie created");
    Ok(detail)
}

pub async fn get_movie_by_id<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> CatalogResult<Option<MovieDetail>> {
    let found =
        movie::Entity::find_by_id(id).find_also_related(country::Entity).one(db).await?;

    match found {
        Some((row, country)) => Ok(Some(load_detail(db, row, country).await?)),
        None => Ok(None),
    }
}

/// Removes the movie and its link rows; genres, actors, languages and the
/// country stay. Returns the record as it was before deletion.
pub async fn delete_movie(
    txn: DatabaseTransaction,
    id: i32,
) -> CatalogResult<Option<MovieDetail>> {
    let Some(detail) = get_movie_by_id(&txn, id).await? else {
        return Ok(None);
    };

    movie_genre::Entity::delete_many()
        .filter(movie_genre::Column::MovieId.eq(id))
        .exec(&txn)
        .await?;
    movie_actor::Entity::delete_many()
        .filter(movie_actor::Column::MovieId.eq(id))
        .exec(&txn)
        .await?;
    movie_language::Entity::delete_many()
        .filter(movie_language::Column::MovieId.eq(id))
        .exec(&txn)
        .await?;
    movie::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    info!(id, "movie deleted");
    Ok(Some(detail))
}

/// Applies `fields` to the bare movie row. Constraint violations come back as
/// [`CatalogError::InvalidInput`]; other storage failures pass through.
pub async fn update_movie(
    txn: DatabaseTransaction,
    id: i32,
    fields: Vec<MovieField>,
) -> CatalogResult<Option<movie::Model>> {
    let Some(row) = movie::Entity::find_by_id(id).one(&txn).await? else {
        return Ok(None);
    };

    if fields.is_empty() {
        debug!(id, "empty patch");
        txn.commit().await?;
        return Ok(Some(row));
    }

    let mut active = row.into_active_model();
    for field in fields {
        match field {
            MovieField::Name(name) => active.name = Set(name),
            MovieField::Date(date) => active.date = Set(date.to_string()),
            MovieField::Score(score) => active.score = Set(score),
            MovieField::Overview(overview) => active.overview = Set(overview),
            MovieField::Status(status) => active.status = Set(status.as_str().to_string()),
            MovieField::Budget(budget) => active.budget = Set(budget),
            MovieField::Revenue(revenue) => active.revenue = Set(revenue),
        }
    }

    let updated = active.update(&txn).await.map_err(rejected)?;
    txn.commit().await.map_err(rejected)?;

    info!(id, "movie updated");
    Ok(Some(updated))
}

/// Inserts the bare movie row. A writer that slipped the same (name, date)
/// in after the pre-check trips the unique index; that is reported as
/// [`CatalogError::Conflict`] too.
async fn insert_movie<C: ConnectionTrait>(
    db: &C,
    row: movie::ActiveModel,
    name: &str,
    date: Date,
) -> CatalogResult<movie::Model> {
    match row.insert(db).await {
        Ok(row) => Ok(row),
        Err(e) if is_unique_violation(&e) => {
            Err(CatalogError::Conflict { name: name.to_string(), date })
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolves each name to a row id, creating rows as needed. Repeated names
/// collapse to one id so the join table never sees a duplicate pair.
async fn resolve_names<E, C>(db: &C, names: &[String]) -> Result<Vec<i32>, DbErr>
where
    E: NaturalKey<Key = str>,
    E::Model: IntoActiveModel<E::Row>,
    C: ConnectionTrait,
{
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id = E::id_of(&get_or_create::<E, _>(db, name.as_str()).await?);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

async fn link<A, C>(db: &C, rows: Vec<A>) -> Result<(), DbErr>
where
    A: ActiveModelTrait + Send + 'static,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    C: ConnectionTrait,
{
    if rows.is_empty() {
        return Ok(());
    }
    <A::Entity as EntityTrait>::insert_many(rows).exec_without_returning(db).await?;
    Ok(())
}

async fn load_detail<C: ConnectionTrait>(
    db: &C,
    row: movie::Model,
    country: Option<country::Model>,
) -> CatalogResult<MovieDetail> {
    let country = country.ok_or(CatalogError::Corrupt { id: row.id, column: "country_id" })?;

    let genres = row.find_related(genre::Entity).order_by_asc(genre::Column::Id).all(db).await?;
    let actors = row.find_related(actor::Entity).order_by_asc(actor::Column::Id).all(db).await?;
    let languages =
        row.find_related(language::Entity).order_by_asc(language::Column::Id).all(db).await?;

    Ok(MovieDetail {
        id: row.id,
        date: parse_date(&row)?,
        status: parse_status(&row)?,
        name: row.name,
        score: row.score,
        overview: row.overview,
        budget: row.budget,
        revenue: row.revenue,
        country: country.into(),
        genres: genres.into_iter().map(Named::from).collect(),
        actors: actors.into_iter().map(Named::from).collect(),
        languages: languages.into_iter().map(Named::from).collect(),
    })
}

fn parse_date(row: &movie::Model) -> CatalogResult<Date> {
    row.date.parse().map_err(|_| CatalogError::Corrupt { id: row.id, column: "date" })
}

fn parse_status(row: &movie::Model) -> CatalogResult<MovieStatus> {
    row.status.parse().map_err(|_| CatalogError::Corrupt { id: row.id, column: "status" })
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn rejected(err: DbErr) -> CatalogError {
    match err.sql_err() {
        Some(_) => CatalogError::InvalidInput(err),
        None => CatalogError::Db(err),
    }
}
