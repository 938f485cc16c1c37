use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DatabaseConnection, EntityTrait};

use super::{PaginationParams, ProjectionParams};
use crate::catalog::{self, Page, RecipeFilter, RecipeInput, RecipeRead, Relations};
use crate::entities::Ingredient;
use crate::error::{AppError, AppResult};
use crate::projection::{self, Document};

pub async fn list_recipes(
    Extension(db): Extension<DatabaseConnection>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<RecipeFilter>,
) -> AppResult<Json<Page<RecipeRead>>> {
    let filter = filter.parse()?;
    let page = catalog::list_recipes(&db, &filter, pagination.page, pagination.per_page).await?;

    tracing::Span::current()
        .record("table", "recipes")
        .record("action", "list_recipes");

    Ok(Json(page))
}

pub async fn get_recipe(
    Extension(db): Extension<DatabaseConnection>,
    Path(recipe_id): Path<i32>,
) -> AppResult<Json<RecipeRead>> {
    tracing::Span::current().record("recipe_id", recipe_id);
    let aggregate = catalog::find_aggregate(&db, recipe_id, Relations::all()).await?;
    Ok(Json(aggregate.into()))
}

pub async fn create_recipe(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Json(payload): Json<RecipeInput>,
) -> AppResult<Response> {
    let recipe_id = catalog::create_recipe(&db, user_id, &payload).await?;
    let aggregate = catalog::find_aggregate(&db, recipe_id, Relations::all()).await?;

    tracing::Span::current()
        .record("table", "recipes")
        .record("action", "create_recipe")
        .record("user_id", user_id)
        .record("recipe_id", recipe_id)
        .record("business_event", "Recipe created");
    crate::metrics::increment_recipes();

    Ok((StatusCode::CREATED, Json(RecipeRead::from(aggregate))).into_response())
}

pub async fn update_recipe(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Path(recipe_id): Path<i32>,
    Json(payload): Json<RecipeInput>,
) -> AppResult<Json<RecipeRead>> {
    tracing::Span::current()
        .record("table", "recipes")
        .record("action", "update_recipe")
        .record("user_id", user_id)
        .record("recipe_id", recipe_id);

    catalog::update_recipe(&db, user_id, recipe_id, &payload).await?;
    let aggregate = catalog::find_aggregate(&db, recipe_id, Relations::all()).await?;
    Ok(Json(aggregate.into()))
}

pub async fn delete_recipe(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Path(recipe_id): Path<i32>,
) -> AppResult<StatusCode> {
    tracing::Span::current()
        .record("table", "recipes")
        .record("action", "delete_recipe")
        .record("user_id", user_id)
        .record("recipe_id", recipe_id);

    catalog::delete_recipe(&db, user_id, recipe_id).await?;
    crate::metrics::decrement_recipes();
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /ingredients/:id/recipes?select=&include=`
pub async fn ingredient_recipes(
    Extension(db): Extension<DatabaseConnection>,
    Path(ingredient_id): Path<i32>,
    Query(params): Query<ProjectionParams>,
) -> AppResult<Json<Vec<Document>>> {
    Ingredient::find_by_id(ingredient_id)
        .one(&db)
        .await?
        .ok_or_else(|| AppError::not_found("Ingredient", ingredient_id))?;

    let select = projection::parse_select(params.select.as_deref())?;
    let include = projection::parse_include(params.include.as_deref())?;

    let recipes = catalog::recipes_with_ingredient(&db, ingredient_id).await?;
    let aggregates =
        catalog::load_aggregates(&db, recipes, Relations::for_include(&include)).await?;

    tracing::Span::current()
        .record("table", "recipes")
        .record("action", "list_ingredient_recipes");

    Ok(Json(projection::project_recipes(&aggregates, &select, &include)))
}
