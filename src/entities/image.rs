use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A source frame of a video project. `order_index` is zero-based and unique per project.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub video_project_id: i32,
    pub image_path: String,
    pub order_index: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::video_project::Entity",
        from = "Column::VideoProjectId",
        to = "super::video_project::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    VideoProject,
}

impl Related<super::video_project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VideoProject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
