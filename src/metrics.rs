use std::time::Duration;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use sea_orm::Iterable;

use crate::entities::{recipe, user, video_project, VideoStatus};

pub async fn init_metrics(db: &DatabaseConnection) {
    let user_count = user::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("recipe_catalog_users_total").set(user_count as f64);

    let recipe_count = recipe::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("recipe_catalog_recipes_total").set(recipe_count as f64);

    let mut project_count = 0;
    for status in VideoStatus::iter() {
        let count = video_project::Entity::find()
            .filter(video_project::Column::Status.eq(status.as_str()))
            .count(db)
            .await
            .unwrap_or(0);
        project_count += count;
        metrics::gauge!("recipe_catalog_video_projects", "status" => status.as_str())
            .set(count as f64);
    }

    tracing::info!(
        "Initialized metrics: Users={}, Recipes={}, VideoProjects={}",
        user_count, recipe_count, project_count
    );
}

pub fn increment_recipes() {
    metrics::gauge!("recipe_catalog_recipes_total").increment(1.0);
}

pub fn decrement_recipes() {
    metrics::gauge!("recipe_catalog_recipes_total").decrement(1.0);
}

pub fn increment_users() {
    metrics::gauge!("recipe_catalog_users_total").increment(1.0);
}

pub fn increment_video_projects_created() {
    metrics::counter!("recipe_catalog_video_projects_created_total").increment(1);
}

pub fn record_video_outcome(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("recipe_catalog_video_jobs_total", "outcome" => outcome).increment(1);
    metrics::histogram!("recipe_catalog_video_job_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

pub fn set_queue_depth(queue: &'static str, len: u64) {
    metrics::gauge!("recipe_catalog_queue_depth", "queue" => queue).set(len as f64);
}
