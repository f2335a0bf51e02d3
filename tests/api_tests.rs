use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Duration;
use project_showcase::{
    config::Config,
    create_router,
    models::{project::Project, user::UserProfile},
    state::AppState,
    storage::{MemoryStore, ProjectRepository, UserDirectory},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_test::assert_ok;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    owner: UserProfile,
    fan: UserProfile,
    project: Project,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let owner = store
            .insert_user(UserProfile::new("Ana Santos", Some("BSIT"), Some("3rd")))
            .await
            .unwrap();
        let fan = store
            .insert_user(UserProfile::new("Ben Cruz", Some("BSCS"), Some("3rd")))
            .await
            .unwrap();
        let project = store
            .insert_project(Project::new(
                owner.id.clone(),
                "Campus Kiosk",
                vec!["Rust".to_string(), "Svelte".to_string()],
            ))
            .await
            .unwrap();

        let state = Arc::new(AppState::build(Config::default(), store).unwrap());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            owner,
            fan,
            project,
        }
    }

    fn token(&self, user: &UserProfile) -> String {
        self.state
            .auth_service
            .issue_token(&user.id, Duration::hours(1))
            .unwrap()
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<&UserProfile>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("authorization", format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

#[tokio::test]
async fn health_check_responds() {
    let app = TestApp::new().await;
    let (status, _) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn like_notifies_owner_once() {
    let app = TestApp::new().await;
    let uri = format!("/api/projects/{}/like", app.project.id);

    let (status, body) = app.send("POST", &uri, Some(&app.fan), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["liked"], json!(true));
    assert_eq!(body["data"]["like_count"], json!(1));

    let (status, body) = app
        .send("GET", "/api/notifications/unread-count", Some(&app.owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["unread_count"], json!(1));

    let (_, body) = app
        .send("GET", "/api/notifications", Some(&app.owner), None)
        .await;
    let notifications = body["data"]["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["notification_type"], json!("like"));
    assert_eq!(notifications[0]["sender_name"], json!("Ben Cruz"));
    assert_eq!(notifications[0]["project_name"], json!("Campus Kiosk"));

    // 取消点赞不产生新通知
    let (_, body) = app.send("POST", &uri, Some(&app.fan), None).await;
    assert_eq!(body["data"]["liked"], json!(false));
    let unread = assert_ok!(app.state.notification_service.unread_count(&app.owner.id).await);
    assert_eq!(unread, 1);
}

#[tokio::test]
async fn write_routes_require_authentication() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send("POST", &format!("/api/projects/{}/like", app.project.id), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send("GET", "/api/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 无效令牌按匿名处理
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/projects/{}/view", app.project.id))
        .header("authorization", "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn feed_places_project_in_trending_section() {
    let app = TestApp::new().await;

    let (status, body) = app.send("GET", "/api/feed", Some(&app.fan), None).await;
    assert_eq!(status, StatusCode::OK);
    let trending = body["data"]["trending"].as_array().unwrap();
    assert_eq!(trending.len(), 1);
    assert_eq!(trending[0]["project_id"], json!(app.project.id));
    assert!(body["data"]["peers"].as_array().unwrap().is_empty());
    assert_eq!(
        body["data"]["available_technologies"],
        json!(["Rust", "Svelte"])
    );

    let (_, body) = app
        .send("GET", "/api/feed?technology=Go", None, None)
        .await;
    assert!(body["data"]["trending"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn browse_rejects_unknown_sort() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send("GET", "/api/projects?sort=likes", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(1));

    let (status, _) = app
        .send("GET", "/api/projects?sort=loudest", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comment_thread_and_delete_authorization() {
    let app = TestApp::new().await;
    let stranger = assert_ok!(
        app.state
            .store
            .insert_user(UserProfile::new("Cara Reyes", None, Some("1st")))
            .await
    );

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/projects/{}/comments", app.project.id),
            Some(&app.fan),
            Some(json!({ "text": "  Great kiosk!  " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["comment"]["text"], json!("Great kiosk!"));
    assert_eq!(body["data"]["comment_count"], json!(1));
    let comment_id = body["data"]["comment"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/projects/{}/comments/{}/replies", app.project.id, comment_id),
            Some(&app.owner),
            Some(json!({ "text": "Thanks!" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let comment_uri = format!("/api/projects/{}/comments/{}", app.project.id, comment_id);
    let (status, _) = app.send("DELETE", &comment_uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 项目作者可以删除他人的评论
    let (status, body) = app.send("DELETE", &comment_uri, Some(&app.owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["comment_count"], json!(0));
}

#[tokio::test]
async fn empty_comment_is_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(
            "POST",
            &format!("/api/projects/{}/comments", app.project.id),
            Some(&app.fan),
            Some(json!({ "text": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notification_click_marks_read_and_redirects() {
    let app = TestApp::new().await;
    app.send(
        "POST",
        &format!("/api/projects/{}/view", app.project.id),
        Some(&app.fan),
        None,
    )
    .await;
    app.send(
        "POST",
        &format!("/api/projects/{}/like", app.project.id),
        Some(&app.fan),
        None,
    )
    .await;

    let (_, body) = app
        .send("GET", "/api/notifications", Some(&app.owner), None)
        .await;
    assert_eq!(body["data"]["unread_count"], json!(1));
    let id = body["data"]["notifications"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // 其他用户无法打开
    let (status, _) = app
        .send("POST", &format!("/api/notifications/{}/click", id), Some(&app.fan), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send("POST", &format!("/api/notifications/{}/click", id), Some(&app.owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["redirect_url"],
        json!(format!("/project/{}", app.project.id))
    );
    assert_eq!(body["data"]["unread_count"], json!(0));

    let (status, body) = app
        .send("POST", "/api/notifications/clear", Some(&app.owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], json!(1));
}

#[tokio::test]
async fn owner_deletes_project() {
    let app = TestApp::new().await;
    let uri = format!("/api/projects/{}", app.project.id);

    let (status, _) = app.send("DELETE", &uri, Some(&app.fan), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("DELETE", &uri, Some(&app.owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_page_and_liked_projects() {
    let app = TestApp::new().await;
    app.send(
        "POST",
        &format!("/api/projects/{}/like", app.project.id),
        Some(&app.fan),
        None,
    )
    .await;

    let (status, body) = app
        .send("GET", &format!("/api/users/{}/projects", app.owner.id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["owner"]["full_name"], json!("Ana Santos"));
    let projects = body["data"]["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["like_count"], json!(1));
    assert_eq!(projects[0]["owner_name"], json!("Ana Santos"));

    let (status, _) = app
        .send("GET", "/api/users/nobody/projects", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("GET", "/api/liked-projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send("GET", "/api/liked-projects", Some(&app.fan), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let liked = body["data"].as_array().unwrap();
    assert_eq!(liked.len(), 1);
    assert_eq!(liked[0]["project_id"], json!(app.project.id));
    assert_eq!(liked[0]["owner_name"], json!("Ana Santos"));
    assert!(liked[0]["liked_at"].is_string());
}

#[tokio::test]
async fn account_deletion_cascades_and_revokes_session() {
    let app = TestApp::new().await;
    app.send(
        "POST",
        &format!("/api/projects/{}/like", app.project.id),
        Some(&app.fan),
        None,
    )
    .await;
    let token = app.token(&app.owner);

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/account")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["projects_deleted"], json!(1));
    assert_eq!(body["data"]["notifications_deleted"], json!(1));

    let (status, _) = app
        .send("GET", &format!("/api/projects/{}", app.project.id), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 旧令牌不再解析出用户
    let request = Request::builder()
        .method("GET")
        .uri("/api/notifications")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (_, body) = app
        .send("GET", "/api/liked-projects", Some(&app.fan), None)
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn feed_filters_by_owner_track() {
    let app = TestApp::new().await;
    let web_dev = assert_ok!(
        app.state
            .store
            .insert_user(UserProfile::new("Dana Lim", Some("BSIT"), Some("4th")).with_track("Web Development"))
            .await
    );
    let portal = assert_ok!(
        app.state
            .store
            .insert_project(Project::new(web_dev.id.clone(), "Alumni Portal", vec!["Go".to_string()]))
            .await
    );

    let (status, body) = app
        .send("GET", "/api/feed?track=Web%20Development", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let trending = body["data"]["trending"].as_array().unwrap();
    assert_eq!(trending.len(), 1);
    assert_eq!(trending[0]["project_id"], json!(portal.id));

    let (_, body) = app.send("GET", "/api/feed", None, None).await;
    assert_eq!(body["data"]["trending"].as_array().unwrap().len(), 2);
}
