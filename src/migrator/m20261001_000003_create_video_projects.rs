use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VideoProjects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VideoProjects::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VideoProjects::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(VideoProjects::VideoPath).string_len(500))
                    .col(ColumnDef::new(VideoProjects::ErrorMessage).text())
                    .col(
                        ColumnDef::new(VideoProjects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(VideoProjects::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Images::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Images::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Images::VideoProjectId).integer().not_null())
                    .col(ColumnDef::new(Images::ImagePath).string_len(500).not_null())
                    .col(ColumnDef::new(Images::OrderIndex).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-image-video_project_id")
                            .from(Images::Table, Images::VideoProjectId)
                            .to(VideoProjects::Table, VideoProjects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_images_project_order")
                    .table(Images::Table)
                    .col(Images::VideoProjectId)
                    .col(Images::OrderIndex)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_video_projects_status")
                    .table(VideoProjects::Table)
                    .col(VideoProjects::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Images::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VideoProjects::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum VideoProjects {
    Table,
    Id,
    Status,
    VideoPath,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Images {
    Table,
    Id,
    VideoProjectId,
    ImagePath,
    OrderIndex,
}
