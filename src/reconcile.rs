//! Get-or-create for rows deduplicated by a natural key.
//!
//! Every natural key is backed by a unique index, so the insert path uses
//! `ON CONFLICT DO NOTHING` and re-reads: two transactions racing on the same
//! key end up sharing one row instead of creating a duplicate.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityName, EntityTrait,
    IntoActiveModel, QueryFilter, Set, sea_query::OnConflict,
};
use tracing::debug;

use crate::entities::{actor, country, genre, language};

/// An entity that is looked up by the values it was created from rather than
/// by its surrogate id.
pub trait NaturalKey: EntityTrait {
    type Key: ?Sized + Sync;
    type Row: ActiveModelTrait<Entity = Self> + Send + 'static;

    /// Columns covered by the entity's unique index.
    fn key_columns() -> Vec<Self::Column>;

    fn matching(key: &Self::Key) -> Condition;

    fn new_row(key: &Self::Key) -> Self::Row;

    fn id_of(row: &Self::Model) -> i32;
}

/// Returns the row matching `key`, inserting it first if missing. The insert
/// is only flushed to `db`; committing is the caller's business.
pub async fn get_or_create<E, C>(db: &C, key: &E::Key) -> Result<E::Model, DbErr>
where
    E: NaturalKey,
    E::Model: IntoActiveModel<E::Row>,
    C: ConnectionTrait,
{
    if let Some(found) = E::find().filter(E::matching(key)).one(db).await? {
        return Ok(found);
    }

    let (_, row) = insert_or_read::<E, C>(db, key).await?;
    Ok(row)
}

/// Inserts the row for `key` unless the unique index already holds one, then
/// reads back whichever row is stored. Returns how many rows the insert wrote
/// (0 when another writer got there first) alongside the row.
async fn insert_or_read<E, C>(db: &C, key: &E::Key) -> Result<(u64, E::Model), DbErr>
where
    E: NaturalKey,
    E::Model: IntoActiveModel<E::Row>,
    C: ConnectionTrait,
{
    let inserted = E::insert(E::new_row(key))
        .on_conflict(OnConflict::columns(E::key_columns()).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;
    debug!(table = E::default().table_name(), inserted, "reconciled related row");

    let row = E::find().filter(E::matching(key)).one(db).await?.ok_or_else(|| {
        DbErr::RecordNotFound(format!("{} row missing after insert", E::default().table_name()))
    })?;
    Ok((inserted, row))
}

macro_rules! name_key {
    ($($entity:ident),+ $(,)?) => {$(
        impl NaturalKey for $entity::Entity {
            type Key = str;
            type Row = $entity::ActiveModel;

            fn key_columns() -> Vec<Self::Column> {
                vec![$entity::Column::Name]
            }

            fn matching(name: &str) -> Condition {
                Condition::all().add($entity::Column::Name.eq(name))
            }

            fn new_row(name: &str) -> Self::Row {
                $entity::ActiveModel { name: Set(name.to_string()), ..Default::default() }
            }

            fn id_of(row: &$entity::Model) -> i32 {
                row.id
            }
        }
    )+};
}

name_key!(genre, actor, language);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CountryKey {
    pub code: String,
    pub name: Option<String>,
}

impl CountryKey {
    /// Key for a bare code; the display name defaults to the code itself.
    pub fn from_code(code: &str) -> Self {
        Self { code: code.to_string(), name: Some(code.to_string()) }
    }
}

impl NaturalKey for country::Entity {
    type Key = CountryKey;
    type Row = country::ActiveModel;

    fn key_columns() -> Vec<Self::Column> {
        vec![country::Column::Code, country::Column::Name]
    }

    fn matching(key: &CountryKey) -> Condition {
        let name = match &key.name {
            Some(name) => country::Column::Name.eq(name.as_str()),
            None => country::Column::Name.is_null(),
        };
        Condition::all().add(country::Column::Code.eq(key.code.as_str())).add(name)
    }

    fn new_row(key: &CountryKey) -> Self::Row {
        country::ActiveModel {
            code: Set(key.code.clone()),
            name: Set(key.name.clone()),
            ..Default::default()
        }
    }

    fn id_of(row: &country::Model) -> i32 {
        row.id
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{PaginatorTrait, TransactionTrait};

    use super::*;
    use crate::db;

    #[tokio::test]
    async fn same_key_same_row_within_one_transaction() {
        let db = db::memory().await;
        let txn = db.begin().await.unwrap();

        let first = get_or_create::<genre::Entity, _>(&txn, "Sci-Fi").await.unwrap();
        let second = get_or_create::<genre::Entity, _>(&txn, "Sci-Fi").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(genre::Entity::find().count(&txn).await.unwrap(), 1);

        let other = get_or_create::<genre::Entity, _>(&txn, "Drama").await.unwrap();
        assert_ne!(other.id, first.id);
        txn.commit().await.unwrap();

        let again = get_or_create::<genre::Entity, _>(&db, "Sci-Fi").await.unwrap();
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn insert_losing_the_race_reuses_stored_row() {
        let db = db::memory().await;

        let (inserted, first) = insert_or_read::<genre::Entity, _>(&db, "Sci-Fi").await.unwrap();
        assert_eq!(inserted, 1);

        let (inserted, second) = insert_or_read::<genre::Entity, _>(&db, "Sci-Fi").await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(second.id, first.id);
        assert_eq!(genre::Entity::find().count(&db).await.unwrap(), 1);

        let us = CountryKey::from_code("US");
        let stored = get_or_create::<country::Entity, _>(&db, &us).await.unwrap();
        let (inserted, again) = insert_or_read::<country::Entity, _>(&db, &us).await.unwrap();
        assert_eq!((inserted, again.id), (0, stored.id));
    }

    #[tokio::test]
    async fn kinds_do_not_share_rows() {
        let db = db::memory().await;
        let actor = get_or_create::<actor::Entity, _>(&db, "English").await.unwrap();
        let language = get_or_create::<language::Entity, _>(&db, "English").await.unwrap();
        assert_eq!(actor.name, language.name);
        assert_eq!(actor::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(language::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn countries_are_keyed_by_code_and_name() {
        let db = db::memory().await;
        let us =
            get_or_create::<country::Entity, _>(&db, &CountryKey::from_code("US")).await.unwrap();
        assert_eq!(us.code, "US");
        assert_eq!(us.name.as_deref(), Some("US"));

        let same =
            get_or_create::<country::Entity, _>(&db, &CountryKey::from_code("US")).await.unwrap();
        assert_eq!(same.id, us.id);

        let named = CountryKey { code: "US".into(), name: Some("United States".into()) };
        let distinct = get_or_create::<country::Entity, _>(&db, &named).await.unwrap();
        assert_ne!(distinct.id, us.id);
        assert_eq!(country::Entity::find().count(&db).await.unwrap(), 2);
    }
}
