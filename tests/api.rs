use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use learn_server::{
    api, certificate::render::HtmlRenderer, config::Config, platform::Platform,
    store::MemoryStore, student::Role,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_sessions::SessionManagerLayer;

fn app(platform: Arc<Platform>) -> Router {
    let sessions =
        SessionManagerLayer::new(tower_sessions::MemoryStore::default()).with_secure(false);
    api::router(platform).layer(sessions)
}

fn platform(dir: &tempfile::TempDir) -> Arc<Platform> {
    let config = Config {
        certificate_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    Arc::new(Platform::new(
        Arc::new(MemoryStore::new()),
        Arc::new(HtmlRenderer),
        &config,
    ))
}

fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register and log in, returning the session cookie.
async fn login(app: &Router, name: &str, email: &str) -> (i64, String) {
    let res = app
        .clone()
        .oneshot(post_json(
            "/api/user/register",
            json!({ "name": name, "email": email, "password": "secret1" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let id = json_body(res).await["id"].as_i64().unwrap();

    let res = app
        .clone()
        .oneshot(post_json(
            "/api/user/login",
            json!({ "email": email, "password": "secret1" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    (id, cookie)
}

#[tokio::test]
async fn test_requests_without_session_are_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(platform(&dir));

    let res = app.clone().oneshot(get("/api/user/me", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .clone()
        .oneshot(get("/api/public/courses", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!([]));

    let res = app
        .oneshot(get("/api/public/courses/42", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_drives_roles_and_grading() {
    let dir = tempfile::tempdir().unwrap();
    let platform = platform(&dir);
    let app = app(platform.clone());

    let (instructor_id, instructor) = login(&app, "Grace", "grace@example.com").await;
    let (_, student) = login(&app, "Ada", "ada@example.com").await;

    let course = json!({ "title": "Rust", "description": "Basics" });
    let res = app
        .clone()
        .oneshot(post_json("/api/instructor/create_course", course.clone(), Some(&instructor)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    platform.store.set_role(instructor_id, Role::Instructor).await.unwrap();
    let res = app
        .clone()
        .oneshot(post_json("/api/instructor/create_course", course, Some(&instructor)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let course_id = json_body(res).await["id"].as_i64().unwrap();

    let quiz = json!({
        "course_id": course_id,
        "title": "Check",
        "questions": [
            { "question": "1+1", "options": ["1", "2"], "correct_answer_index": 1 },
            { "question": "2+2", "options": ["4", "5"], "correct_answer_index": 0 }
        ]
    });
    let res = app
        .clone()
        .oneshot(post_json("/api/instructor/add_quiz", quiz, Some(&instructor)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let quiz_id = json_body(res).await["id"].as_i64().unwrap();

    let res = app
        .clone()
        .oneshot(post_json(
            &format!("/api/student/enroll/{course_id}"),
            json!(null),
            Some(&student),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // answer keys never reach students
    let res = app
        .clone()
        .oneshot(get(
            &format!("/api/student/courses/{course_id}/quizzes"),
            Some(&student),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert!(body[0]["questions"][0].get("correct_answer_index").is_none());

    let res = app
        .clone()
        .oneshot(post_json(
            &format!("/api/student/quizzes/{quiz_id}/submit"),
            json!({ "answers": [1, 0] }),
            Some(&student),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let outcome = json_body(res).await;
    assert_eq!(outcome["score"], 2);
    assert_eq!(outcome["passed"], true);
    let name = outcome["certificate"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(get(&format!("/api/user/certificate/{name}"), Some(&student)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(
        res.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );

    let res = app
        .clone()
        .oneshot(post_json("/api/user/logout", json!(null), Some(&student)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.oneshot(get("/api/user/me", Some(&student))).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
