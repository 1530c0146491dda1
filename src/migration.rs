//! Schema for the crate's own tables. The searchable object tables belong to the host
//! system and are not created here.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateSearchTables)]
    }
}

pub struct CreateSearchTables;

impl MigrationName for CreateSearchTables {
    fn name(&self) -> &'static str {
        "m20250101_000001_create_search_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateSearchTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SavedSearches::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SavedSearches::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SavedSearches::Owner).string().not_null())
                    .col(ColumnDef::new(SavedSearches::SearchType).string().not_null())
                    .col(ColumnDef::new(SavedSearches::Name).string().not_null())
                    .col(ColumnDef::new(SavedSearches::Description).text().null())
                    .col(ColumnDef::new(SavedSearches::Item).json().not_null())
                    .col(ColumnDef::new(SavedSearches::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(SavedSearches::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_saved_searches_owner_type_name")
                    .table(SavedSearches::Table)
                    .col(SavedSearches::Owner)
                    .col(SavedSearches::SearchType)
                    .col(SavedSearches::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskDefinitions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaskDefinitions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(TaskDefinitions::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(TaskDefinitions::SubType).string().not_null())
                    .col(ColumnDef::new(TaskDefinitions::Owner).string().not_null())
                    .col(ColumnDef::new(TaskDefinitions::Description).text().null())
                    .col(ColumnDef::new(TaskDefinitions::Template).boolean().not_null().default(false))
                    .col(ColumnDef::new(TaskDefinitions::Arguments).json().not_null())
                    .col(ColumnDef::new(TaskDefinitions::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(TaskDefinitions::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskResults::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaskResults::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(TaskResults::DefinitionId).uuid().null())
                    .col(ColumnDef::new(TaskResults::Name).string().not_null())
                    .col(ColumnDef::new(TaskResults::SubType).string().not_null())
                    .col(ColumnDef::new(TaskResults::Launcher).string().not_null())
                    .col(ColumnDef::new(TaskResults::Status).string().not_null())
                    .col(ColumnDef::new(TaskResults::Arguments).json().not_null())
                    .col(ColumnDef::new(TaskResults::LaunchedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TaskResults::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskDefinitions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SavedSearches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SavedSearches {
    Table,
    Id,
    Owner,
    SearchType,
    Name,
    Description,
    Item,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TaskDefinitions {
    Table,
    Id,
    Name,
    SubType,
    Owner,
    Description,
    Template,
    Arguments,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TaskResults {
    Table,
    Id,
    DefinitionId,
    Name,
    SubType,
    Launcher,
    Status,
    Arguments,
    LaunchedAt,
}
