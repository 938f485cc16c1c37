//! CRUD handlers for the name-only lookup tables. Every table gets the same five
//! handlers, generated by `lookup_resource!`.

use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct NameInput {
    pub name: String,
}

impl NameInput {
    fn validated(self) -> AppResult<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        Ok(name.to_string())
    }
}

macro_rules! lookup_resource {
    ($module:ident, $entity:ident, $label:literal, $table:literal) => {
        pub mod $module {
            use axum::{
                extract::{Extension, Json, Path},
                http::StatusCode,
                response::{IntoResponse, Response},
            };
            use sea_orm::{
                ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryOrder,
                Set,
            };

            use super::NameInput;
            use crate::entities::$entity::{ActiveModel, Column, Entity, Model};
            use crate::error::{AppError, AppResult};

            fn conflict(name: &str) -> String {
                format!("{} with name '{}' already exists", $label, name)
            }

            async fn find(db: &DatabaseConnection, id: i32) -> AppResult<Model> {
                Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| AppError::not_found($label, id))
            }

            pub async fn list(
                Extension(db): Extension<DatabaseConnection>,
            ) -> AppResult<Json<Vec<Model>>> {
                let rows = Entity::find().order_by_asc(Column::Id).all(&db).await?;
                Ok(Json(rows))
            }

            pub async fn get(
                Extension(db): Extension<DatabaseConnection>,
                Path(id): Path<i32>,
            ) -> AppResult<Json<Model>> {
                Ok(Json(find(&db, id).await?))
            }

            pub async fn create(
                Extension(db): Extension<DatabaseConnection>,
                Json(payload): Json<NameInput>,
            ) -> AppResult<Response> {
                let name = payload.validated()?;
                let created = ActiveModel {
                    name: Set(name.clone()),
                    ..Default::default()
                }
                .insert(&db)
                .await
                .map_err(|e| AppError::from_write(e, conflict(&name)))?;

                tracing::Span::current()
                    .record("table", $table)
                    .record("action", concat!("create_", $table));

                Ok((StatusCode::CREATED, Json(created)).into_response())
            }

            pub async fn update(
                Extension(db): Extension<DatabaseConnection>,
                Path(id): Path<i32>,
                Json(payload): Json<NameInput>,
            ) -> AppResult<Json<Model>> {
                let name = payload.validated()?;
                let mut active = find(&db, id).await?.into_active_model();
                active.name = Set(name.clone());
                let updated = active
                    .update(&db)
                    .await
                    .map_err(|e| AppError::from_write(e, conflict(&name)))?;

                tracing::Span::current()
                    .record("table", $table)
                    .record("action", concat!("update_", $table));

                Ok(Json(updated))
            }

            pub async fn delete(
                Extension(db): Extension<DatabaseConnection>,
                Path(id): Path<i32>,
            ) -> AppResult<StatusCode> {
                let result = Entity::delete_by_id(id).exec(&db).await?;
                if result.rows_affected == 0 {
                    return Err(AppError::not_found($label, id));
                }

                tracing::Span::current()
                    .record("table", $table)
                    .record("action", concat!("delete_", $table));

                Ok(StatusCode::NO_CONTENT)
            }
        }
    };
}

lookup_resource!(ingredients, ingredient, "Ingredient", "ingredients");
lookup_resource!(cuisines, cuisine, "Cuisine", "cuisines");
lookup_resource!(allergens, allergen, "Allergen", "allergens");
