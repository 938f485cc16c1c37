mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use recipe_catalog::entities::{image, Image, VideoProject, VideoStatus};
use recipe_catalog::queue::JobQueue;
use recipe_catalog::{api, config::MediaLayout};
use sea_orm::{EntityTrait, QueryOrder};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{create_ingredient, setup_db, TestDb};

const BOUNDARY: &str = "recipe-catalog-test-boundary";

/// Stands in for redis: remembers pushed project ids, or refuses every push.
#[derive(Default)]
struct RecordingQueue {
    pushed: Mutex<Vec<i32>>,
    down: bool,
}

impl RecordingQueue {
    fn down() -> Self {
        Self {
            pushed: Mutex::new(Vec::new()),
            down: true,
        }
    }

    fn pushed(&self) -> Vec<i32> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue_video(&self, project_id: i32) -> redis::RedisResult<()> {
        if self.down {
            return Err(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            )));
        }
        self.pushed.lock().unwrap().push(project_id);
        Ok(())
    }
}

fn media(test: &TestDb) -> MediaLayout {
    MediaLayout::new(test.dir.path().join("media"), "/media")
}

fn app_with_queue(test: &TestDb, queue: Arc<RecordingQueue>) -> Router {
    api::router(test.db.clone(), queue, media(test))
}

fn app(test: &TestDb) -> Router {
    app_with_queue(test, Arc::new(RecordingQueue::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value, user_id: Option<i32>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(id) = user_id {
        builder = builder.header(header::COOKIE, format!("recipe_catalog_user={id}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn multipart(files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/videos")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_ingredient_recipes_unknown_ingredient_is_404() {
    let test = setup_db().await;
    let app = app(&test);

    let (status, body) = send(&app, get("/ingredients/999/recipes")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Ingredient with id 999 not found"}));
}

#[tokio::test]
async fn test_ingredient_recipes_rejects_unknown_tokens() {
    let test = setup_db().await;
    let pasta = create_ingredient(&test.db, "Pasta").await;
    let app = app(&test);

    let (status, body) = send(
        &app,
        get(&format!("/ingredients/{}/recipes?select=id,calories,sugar", pasta.id)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("calories"));
    assert!(message.contains("sugar"));
    assert!(message.contains("cooking_time"));

    let (status, body) = send(
        &app,
        get(&format!("/ingredients/{}/recipes?include=steps", pasta.id)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("steps"));

    let (status, body) = send(&app, get(&format!("/ingredients/{}/recipes", pasta.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_duplicate_lookup_name_conflicts() {
    let test = setup_db().await;
    let app = app(&test);

    let (status, body) =
        send(&app, json_request("POST", "/cuisines", json!({"name": "Thai"}), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Thai");

    let (status, body) =
        send(&app, json_request("POST", "/cuisines", json!({"name": "Thai"}), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"error": "Cuisine with name 'Thai' already exists"}));

    let (status, _) = send(&app, get("/cuisines/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recipe_mutations_require_session_and_authorship() {
    let test = setup_db().await;
    let app = app(&test);

    let recipe = json!({
        "title": "Pad thai",
        "description": "Noodles",
        "cooking_time": 25,
    });

    let (status, _) = send(&app, json_request("POST", "/recipes", recipe.clone(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    for email in ["a@example.com", "b@example.com"] {
        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/auth/register",
                json!({"email": email, "password": "correct horse"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({"email": "a@example.com", "password": "correct horse"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("recipe_catalog_user="));

    let (status, body) = send(&app, json_request("POST", "/recipes", recipe.clone(), Some(1))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["difficulty"], 1);
    assert_eq!(body["author"]["id"], 1);
    let id = body["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        json_request("PUT", &format!("/recipes/{id}"), recipe.clone(), Some(2)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "Not authorized to update this recipe"}));

    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("/recipes/{id}"), json!({}), Some(1)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&format!("/recipes/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let test = setup_db().await;
    let app = app(&test);

    send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            json!({"email": "cook@example.com", "password": "correct horse"}),
            None,
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/login",
            json!({"email": "cook@example.com", "password": "battery staple"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Invalid email or password"}));
}

#[tokio::test]
async fn test_upload_validation_happens_before_persisting() {
    let test = setup_db().await;
    let app = app(&test);

    let (status, body) = send(&app, multipart(&[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No images provided"}));

    let (status, body) = send(
        &app,
        multipart(&[("cover.png", &b"png bytes"[..]), ("notes.txt", &b"hello"[..])]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "Invalid file type: notes.txt. Allowed: .jpg, .jpeg, .png, .webp"})
    );

    let (status, body) = send(&app, get("/videos")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    assert!(!test.dir.path().join("media").join("images").exists());

    let (status, body) = send(&app, get("/videos/5")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Video project 5 not found"}));
}

#[tokio::test]
async fn test_upload_stores_files_rows_and_enqueues() {
    let test = setup_db().await;
    let queue = Arc::new(RecordingQueue::default());
    let app = app_with_queue(&test, queue.clone());

    let (status, body) = send(
        &app,
        multipart(&[("a.PNG", &b"first frame"[..]), ("b.jpg", &b"second frame"[..])]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({
            "id": 1,
            "status": "pending",
            "message": "Images uploaded successfully. Video generation started.",
        })
    );
    assert_eq!(queue.pushed(), vec![1]);

    let images_dir = media(&test).images_dir();
    let first = images_dir.join("project_1_img_0.PNG");
    let second = images_dir.join("project_1_img_1.jpg");
    assert_eq!(std::fs::read(&first).unwrap(), b"first frame");
    assert_eq!(std::fs::read(&second).unwrap(), b"second frame");

    let rows = Image::find()
        .order_by_asc(image::Column::OrderIndex)
        .all(&test.db)
        .await
        .unwrap();
    let stored: Vec<(i32, i32, String)> = rows
        .into_iter()
        .map(|r| (r.video_project_id, r.order_index, r.image_path))
        .collect();
    assert_eq!(
        stored,
        vec![
            (1, 0, first.to_string_lossy().into_owned()),
            (1, 1, second.to_string_lossy().into_owned()),
        ]
    );

    let (status, body) = send(&app, get("/videos/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["video_url"], Value::Null);
    assert_eq!(body["images"][0]["image_url"], "/media/images/project_1_img_0.PNG");
    assert_eq!(body["images"][1]["image_url"], "/media/images/project_1_img_1.jpg");
    assert_eq!(body["images"][1]["order_index"], 1);
}

#[tokio::test]
async fn test_upload_is_discarded_when_queue_is_down() {
    let test = setup_db().await;
    let queue = Arc::new(RecordingQueue::down());
    let app = app_with_queue(&test, queue.clone());

    let (status, body) = send(
        &app,
        multipart(&[("a.PNG", &b"first frame"[..]), ("b.jpg", &b"second frame"[..])]),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Queue error"));
    assert!(queue.pushed().is_empty());

    let projects = VideoProject::find().all(&test.db).await.unwrap();
    assert!(projects.is_empty());
    let rows = Image::find().all(&test.db).await.unwrap();
    assert!(rows.is_empty());

    let images_dir = media(&test).images_dir();
    assert!(!images_dir.join("project_1_img_0.PNG").exists());
    assert!(!images_dir.join("project_1_img_1.jpg").exists());

    // A retry once the queue is back starts a fresh, single project.
    let queue = Arc::new(RecordingQueue::default());
    let app = app_with_queue(&test, queue.clone());
    let (status, body) = send(&app, multipart(&[("a.png", &b"frame"[..])])).await;
    assert_eq!(status, StatusCode::CREATED);
    let projects = VideoProject::find().all(&test.db).await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].status, VideoStatus::Pending);
    assert_eq!(queue.pushed(), vec![body["id"].as_i64().unwrap() as i32]);
}

#[tokio::test]
async fn test_huge_page_number_is_a_bad_request() {
    let test = setup_db().await;
    let app = app(&test);

    let (status, body) = send(&app, get("/recipes?page=9223372036854775807")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "page 9223372036854775807 is out of range"})
    );

    let (status, body) = send(&app, get("/recipes?page=3&per_page=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["page"], 3);
}
