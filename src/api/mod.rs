pub mod auth;
pub mod lookups;
pub mod middleware;
pub mod recipes;
pub mod videos;

use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tower_http::services::ServeDir;

use crate::config::MediaLayout;
use crate::queue::SharedQueue;

/// `?page=&per_page=`; page is 1-based.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    10
}

/// Raw `?select=&include=` values, validated by [`crate::projection`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProjectionParams {
    pub select: Option<String>,
    pub include: Option<String>,
}

/// All application routes with their shared state. Recipe mutations sit behind
/// [`middleware::auth_middleware`]; uploaded media is served under `media.url_prefix`.
/// New video projects are handed to `queue`.
pub fn router(db: DatabaseConnection, queue: SharedQueue, media: MediaLayout) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout));

    let protected_routes = Router::new()
        .route("/recipes", post(recipes::create_recipe))
        .route(
            "/recipes/:id",
            put(recipes::update_recipe).delete(recipes::delete_recipe),
        )
        .route_layer(axum::middleware::from_fn(middleware::auth_middleware));

    let public_routes = Router::new()
        .route("/recipes", get(recipes::list_recipes))
        .route("/recipes/:id", get(recipes::get_recipe))
        .route(
            "/ingredients",
            get(lookups::ingredients::list).post(lookups::ingredients::create),
        )
        .route(
            "/ingredients/:id",
            get(lookups::ingredients::get)
                .put(lookups::ingredients::update)
                .delete(lookups::ingredients::delete),
        )
        .route("/ingredients/:id/recipes", get(recipes::ingredient_recipes))
        .route(
            "/cuisines",
            get(lookups::cuisines::list).post(lookups::cuisines::create),
        )
        .route(
            "/cuisines/:id",
            get(lookups::cuisines::get)
                .put(lookups::cuisines::update)
                .delete(lookups::cuisines::delete),
        )
        .route(
            "/allergens",
            get(lookups::allergens::list).post(lookups::allergens::create),
        )
        .route(
            "/allergens/:id",
            get(lookups::allergens::get)
                .put(lookups::allergens::update)
                .delete(lookups::allergens::delete),
        )
        .route(
            "/videos",
            get(videos::list_projects).post(videos::upload_images),
        )
        .route("/videos/:id", get(videos::get_project));

    let media_service = ServeDir::new(&media.root);
    let media_prefix = media.url_prefix.clone();

    Router::new()
        .merge(auth_routes)
        .merge(protected_routes)
        .merge(public_routes)
        .nest_service(&media_prefix, media_service)
        .layer(Extension(db))
        .layer(Extension(queue))
        .layer(Extension(media))
        .layer(tower_cookies::CookieManagerLayer::new())
}
