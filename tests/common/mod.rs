#![allow(dead_code)]

use std::path::Path;

use recipe_catalog::entities::{allergen, cuisine, image, ingredient, user, video_project, VideoStatus};
use recipe_catalog::migrator::Migrator;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;

/// A migrated sqlite database living in its own temp directory.
pub struct TestDb {
    pub db: DatabaseConnection,
    pub dir: TempDir,
}

pub async fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());

    let mut options = ConnectOptions::new(url);
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    TestDb { db, dir }
}

pub async fn create_user(db: &DatabaseConnection, email: &str) -> user::Model {
    let now = chrono::Utc::now().naive_utc();
    user::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set("not-a-real-hash".to_string()),
        first_name: Set(Some("Test".to_string())),
        last_name: Set(Some("Cook".to_string())),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_cuisine(db: &DatabaseConnection, name: &str) -> cuisine::Model {
    cuisine::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_allergen(db: &DatabaseConnection, name: &str) -> allergen::Model {
    allergen::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_ingredient(db: &DatabaseConnection, name: &str) -> ingredient::Model {
    ingredient::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_project(db: &DatabaseConnection, status: VideoStatus) -> video_project::Model {
    let now = chrono::Utc::now().fixed_offset();
    video_project::ActiveModel {
        status: Set(status),
        video_path: Set(None),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn attach_image(
    db: &DatabaseConnection,
    project_id: i32,
    path: &Path,
    order_index: i32,
) -> image::Model {
    image::ActiveModel {
        video_project_id: Set(project_id),
        image_path: Set(path.to_string_lossy().into_owned()),
        order_index: Set(order_index),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Writes a solid-colour PNG of the given size.
pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    ::image::RgbImage::from_pixel(width, height, ::image::Rgb([200, 120, 40]))
        .save(path)
        .unwrap();
}
