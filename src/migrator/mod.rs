use sea_orm_migration::prelude::*;

mod m20261001_000001_create_users_and_lookups;
mod m20261001_000002_create_recipes;
mod m20261001_000003_create_video_projects;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_users_and_lookups::Migration),
            Box::new(m20261001_000002_create_recipes::Migration),
            Box::new(m20261001_000003_create_video_projects::Migration),
        ]
    }
}
