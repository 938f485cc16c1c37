use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::error::AppError;

pub const SESSION_COOKIE: &str = "recipe_catalog_user";

/// Rejects requests without a session cookie and exposes the caller's user id
/// as an `Extension<i32>`.
pub async fn auth_middleware(cookies: Cookies, mut request: Request, next: Next) -> Response {
    match cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| cookie.value().parse::<i32>().ok())
    {
        Some(user_id) => {
            tracing::Span::current().record("user_id", user_id);
            request.extensions_mut().insert(user_id);
            next.run(request).await
        }
        None => AppError::Unauthorized("Unauthorized".into()).into_response(),
    }
}
