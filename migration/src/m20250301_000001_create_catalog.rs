use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Countries::Table)
                    .if_not_exists()
                    .col(pk_auto(Countries::Id))
                    .col(string_len(Countries::Code, 3))
                    .col(string_null(Countries::Name))
                    .to_owned(),
            )
            .await?;

        for (table, id, name) in [
            (Named::Genres, Named::Id, Named::Name),
            (Named::Actors, Named::Id, Named::Name),
            (Named::Languages, Named::Id, Named::Name),
        ] {
            manager
                .create_table(
                    Table::create()
                        .table(table)
                        .if_not_exists()
                        .col(pk_auto(id))
                        .col(string(name))
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(pk_auto(Movies::Id))
                    .col(string_len(Movies::Name, 255))
                    .col(string(Movies::Date))
                    .col(double(Movies::Score))
                    .col(text(Movies::Overview))
                    .col(string(Movies::Status))
                    .col(double(Movies::Budget))
                    .col(double(Movies::Revenue))
                    .col(integer(Movies::CountryId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movies_country_id")
                            .from(Movies::Table, Movies::CountryId)
                            .to(Countries::Table, Countries::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_country_id")
                    .table(Movies::Table)
                    .col(Movies::CountryId)
                    .to_owned(),
            )
            .await?;

        for (join, column, target) in [
            (Join::MovieGenres, Join::GenreId, Named::Genres),
            (Join::MovieActors, Join::ActorId, Named::Actors),
            (Join::MovieLanguages, Join::LanguageId, Named::Languages),
        ] {
            manager
                .create_table(
                    Table::create()
                        .table(join)
                        .if_not_exists()
                        .col(integer(Join::MovieId))
                        .col(integer(column))
                        .primary_key(Index::create().col(Join::MovieId).col(column))
                        .foreign_key(
                            ForeignKey::create()
                                .from(join, Join::MovieId)
                                .to(Movies::Table, Movies::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(join, column)
                                .to(target, Named::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for join in [Join::MovieLanguages, Join::MovieActors, Join::MovieGenres] {
            manager.drop_table(Table::drop().table(join).to_owned()).await?;
        }
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        for table in [Named::Languages, Named::Actors, Named::Genres] {
            manager.drop_table(Table::drop().table(table).to_owned()).await?;
        }
        manager.drop_table(Table::drop().table(Countries::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Name,
    Date,
    Score,
    Overview,
    Status,
    Budget,
    Revenue,
    CountryId,
}

#[derive(DeriveIden)]
enum Countries {
    Table,
    Id,
    Code,
    Name,
}

/// Tables keyed by a single `name` column.
#[derive(DeriveIden, Clone, Copy)]
enum Named {
    Genres,
    Actors,
    Languages,
    Id,
    Name,
}

#[derive(DeriveIden, Clone, Copy)]
enum Join {
    MovieGenres,
    MovieActors,
    MovieLanguages,
    MovieId,
    GenreId,
    ActorId,
    LanguageId,
}
