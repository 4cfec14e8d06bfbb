use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_movies_name_date_unique")
                    .table(Movies::Table)
                    .col(Movies::Name)
                    .col(Movies::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_countries_code_name_unique")
                    .table(Countries::Table)
                    .col(Countries::Code)
                    .col(Countries::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        for (index, table) in [
            ("idx_genres_name_unique", Named::Genres),
            ("idx_actors_name_unique", Named::Actors),
            ("idx_languages_name_unique", Named::Languages),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(index)
                        .table(table)
                        .col(Named::Name)
                        .unique()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (index, table) in [
            ("idx_languages_name_unique", Named::Languages),
            ("idx_actors_name_unique", Named::Actors),
            ("idx_genres_name_unique", Named::Genres),
        ] {
            manager.drop_index(Index::drop().name(index).table(table).to_owned()).await?;
        }

        manager
            .drop_index(
                Index::drop()
                    .name("idx_countries_code_name_unique")
                    .table(Countries::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_movies_name_date_unique")
                    .table(Movies::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Name,
    Date,
}

#[derive(DeriveIden)]
enum Countries {
    Table,
    Code,
    Name,
}

#[derive(DeriveIden)]
enum Named {
    Genres,
    Actors,
    Languages,
    Name,
}
