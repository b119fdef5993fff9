use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::middleware::{require_auth, require_worker};
use crate::state::AppState;
use crate::{auth, health, videos, worker};

/// All HTTP routes. CORS and request tracing are layered on by the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/auth/token", post(auth::generate_auth_token))
        .route("/auth/status", post(auth::check_auth_status))
        .route("/auth/login", post(auth::login_with_telegram))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/videos", get(videos::list_videos))
        .route("/videos/downloads", post(videos::request_download))
        .route("/videos/{video_id}", get(videos::get_video).delete(videos::delete_video))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let internal_routes = Router::new()
        .route("/internal/sessions/verify", post(worker::verify_session))
        .route("/internal/downloads/pending", get(worker::list_pending))
        .route("/internal/downloads/claim", post(worker::claim_next))
        .route(
            "/internal/downloads/{id}",
            get(worker::get_download).patch(worker::update_download),
        )
        .route("/internal/downloads/{id}/claim", post(worker::claim))
        .route("/internal/downloads/{id}/complete", post(worker::complete_download))
        .route("/internal/downloads/{id}/fail", post(worker::fail_download))
        .route("/internal/videos", post(worker::create_video))
        .route("/internal/videos/{id}", patch(worker::update_video))
        .layer(middleware::from_fn_with_state(state.clone(), require_worker))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(internal_routes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use reel_db::Database;
    use reel_db::models::{NewVideo, UserFields, VideoFile};
    use reel_types::models::VideoStatus;

    use super::*;
    use crate::state::{AppStateInner, Settings};

    const WORKER: &str = "worker-secret";

    fn test_state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            settings: Settings::new("jwt-secret", WORKER),
        })
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, cookie, body)
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn with_cookie(mut req: Request<Body>, cookie: &str) -> Request<Body> {
        req.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
        req
    }

    fn as_worker(mut req: Request<Body>) -> Request<Body> {
        req.headers_mut()
            .insert(crate::middleware::WORKER_SECRET_HEADER, WORKER.parse().unwrap());
        req
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    /// Runs the QR handshake for `telegram_user_id` and returns the session cookie pair.
    async fn sign_in(app: &Router, telegram_user_id: i64) -> (String, i64) {
        let (_, _, body) = send(app, empty("POST", "/auth/token")).await;
        let token = body["authToken"].as_str().unwrap().to_string();

        let verify = json!({ "authToken": token, "telegramUserId": telegram_user_id, "telegramUsername": "ada" });
        let (status, _, body) = send(app, as_worker(json_req("POST", "/internal/sessions/verify", verify))).await;
        assert_eq!(status, StatusCode::OK);
        let user_id = body["userId"].as_i64().unwrap();

        let (status, cookie, body) = send(app, json_req("POST", "/auth/login", json!({ "authToken": token }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "userId": user_id }));

        let cookie = cookie.unwrap();
        let pair = cookie.split(';').next().unwrap().to_string();
        assert!(pair.starts_with("reel_session="));
        (pair, user_id)
    }

    #[tokio::test]
    async fn qr_handshake_end_to_end() {
        let app = router(test_state());

        let (status, _, body) = send(&app, empty("POST", "/auth/token")).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["authToken"].as_str().unwrap().to_string();
        assert_eq!(token.len(), 32);

        let poll = || json_req("POST", "/auth/status", json!({ "authToken": token }));
        let (status, _, body) = send(&app, poll()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "verified": false, "userId": null, "telegramUsername": null }));

        // Login before the bot has verified anything
        let (status, cookie, body) = send(&app, json_req("POST", "/auth/login", json!({ "authToken": token }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert!(cookie.is_none());

        let verify = json!({ "authToken": token, "telegramUserId": 1001, "telegramUsername": "ada", "name": "Ada" });
        let (status, _, _) = send(&app, json_req("POST", "/internal/sessions/verify", verify.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, body) = send(&app, as_worker(json_req("POST", "/internal/sessions/verify", verify))).await;
        assert_eq!(status, StatusCode::OK);
        let user_id = body["userId"].as_i64().unwrap();

        let (_, _, body) = send(&app, poll()).await;
        assert_eq!(body, json!({ "verified": true, "userId": user_id, "telegramUsername": "ada" }));

        let (status, cookie, body) = send(&app, json_req("POST", "/auth/login", json!({ "authToken": token }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "userId": user_id }));
        let cookie = cookie.unwrap();
        assert!(cookie.contains("HttpOnly"));
        let pair = cookie.split(';').next().unwrap().to_string();

        let (status, _, body) = send(&app, with_cookie(empty("GET", "/auth/me"), &pair)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], user_id);
        assert_eq!(body["openId"], "telegram_1001");
        assert_eq!(body["name"], "Ada");
    }

    #[tokio::test]
    async fn unknown_token_status_is_not_found() {
        let app = router(test_state());
        let (status, _, body) = send(&app, json_req("POST", "/auth/status", json!({ "authToken": "nope" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn me_without_session_is_null() {
        let app = router(test_state());
        let (status, _, body) = send(&app, empty("GET", "/auth/me")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);

        let (_, _, body) = send(&app, with_cookie(empty("GET", "/auth/me"), "reel_session=garbage")).await;
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let app = router(test_state());
        let (status, cookie, body) = send(&app, empty("POST", "/auth/logout")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let cookie = cookie.unwrap();
        assert!(cookie.starts_with("reel_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn video_routes_need_a_session() {
        let app = router(test_state());
        for req in [
            empty("GET", "/videos"),
            empty("GET", "/videos/1"),
            empty("DELETE", "/videos/1"),
            json_req("POST", "/videos/downloads", json!({ "youtubeUrl": "https://youtube.com/watch?v=abc", "youtubeId": "abc" })),
        ] {
            let (status, _, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["code"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn download_request_lifecycle() {
        let state = test_state();
        let app = router(state.clone());
        let (cookie, user_id) = sign_in(&app, 7).await;

        let request = json!({ "youtubeUrl": "https://youtube.com/watch?v=abc", "youtubeId": "abc" });
        let (status, _, body) = send(&app, with_cookie(json_req("POST", "/videos/downloads", request.clone()), &cookie)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "pending");
        let request_id = body["requestId"].as_i64().unwrap();

        // Same video again while the first request is still open
        let (status, _, _) = send(&app, with_cookie(json_req("POST", "/videos/downloads", request), &cookie)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, _, body) = send(&app, as_worker(empty("GET", "/internal/downloads/pending"))).await;
        let pending = body.as_array().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["id"], request_id);
        assert_eq!(pending[0]["userId"], user_id);

        let (status, _, body) = send(&app, as_worker(empty("POST", "/internal/downloads/claim"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processing");

        let claim_again = format!("/internal/downloads/{}/claim", request_id);
        let (status, _, body) = send(&app, as_worker(empty("POST", &claim_again))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let (status, _, _) = send(&app, as_worker(empty("POST", "/internal/downloads/claim"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let details = json!({
            "title": "abc",
            "fileKey": "videos/7/abc.mp4",
            "fileUrl": "https://cdn.example.com/abc.mp4",
            "fileSize": 2048,
            "mimeType": "video/mp4"
        });
        let complete = format!("/internal/downloads/{}/complete", request_id);
        let (status, _, body) = send(&app, as_worker(json_req("POST", &complete, details))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        let video_id = body["videoId"].as_i64().unwrap();

        let entry = format!("/internal/downloads/{}", request_id);
        let (_, _, body) = send(&app, as_worker(empty("GET", &entry))).await;
        assert_eq!(body["videoId"], video_id);

        let (_, _, body) = send(&app, with_cookie(empty("GET", "/videos"), &cookie)).await;
        let videos = body.as_array().unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0]["id"], video_id);
        assert_eq!(videos[0]["status"], "ready");

        let video = state.db.get_video(video_id).unwrap().unwrap();
        assert_eq!(video.user_id, user_id);
    }

    #[tokio::test]
    async fn free_form_update_sets_video_link() {
        let state = test_state();
        let app = router(state.clone());
        let (cookie, user_id) = sign_in(&app, 7).await;

        let request = json!({ "youtubeUrl": "https://youtube.com/watch?v=abc", "youtubeId": "abc" });
        let (_, _, body) = send(&app, with_cookie(json_req("POST", "/videos/downloads", request), &cookie)).await;
        let request_id = body["requestId"].as_i64().unwrap();

        let create = json!({
            "userId": user_id,
            "youtubeId": "abc",
            "title": "abc",
            "fileKey": "k",
            "fileUrl": "u",
            "status": "ready"
        });
        let (status, _, body) = send(&app, as_worker(json_req("POST", "/internal/videos", create))).await;
        assert_eq!(status, StatusCode::CREATED);
        let video_id = body["id"].as_i64().unwrap();

        let uri = format!("/internal/downloads/{}", request_id);
        let patch = json!({ "status": "completed", "videoId": video_id });
        let (status, _, body) = send(&app, as_worker(json_req("PATCH", &uri, patch))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["videoId"], video_id);
    }

    #[tokio::test]
    async fn invalid_url_creates_nothing() {
        let state = test_state();
        let app = router(state.clone());
        let (cookie, _) = sign_in(&app, 7).await;

        let request = json!({ "youtubeUrl": "definitely not a url", "youtubeId": "abc" });
        let (status, _, body) = send(&app, with_cookie(json_req("POST", "/videos/downloads", request), &cookie)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        assert!(state.db.list_pending_downloads().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_input_is_a_json_bad_request() {
        let state = test_state();
        let app = router(state.clone());
        let (cookie, _) = sign_in(&app, 7).await;

        let missing_id = json!({ "youtubeUrl": "https://youtube.com/watch?v=abc" });
        let (status, _, body) = send(&app, with_cookie(json_req("POST", "/videos/downloads", missing_id), &cookie)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["message"].as_str().unwrap().contains("youtubeId"));

        let (status, _, body) = send(&app, with_cookie(empty("GET", "/videos/abc"), &cookie)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let (status, _, body) = send(&app, as_worker(empty("GET", "/internal/downloads/abc"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let not_json = Request::builder()
            .method("POST")
            .uri("/auth/status")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, not_json).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        assert!(state.db.list_pending_downloads().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_account_cannot_claim_verified_token() {
        let app = router(test_state());
        let (_, _, body) = send(&app, empty("POST", "/auth/token")).await;
        let token = body["authToken"].as_str().unwrap().to_string();

        let first = json!({ "authToken": token, "telegramUserId": 1, "telegramUsername": "ada" });
        let (status, _, body) = send(&app, as_worker(json_req("POST", "/internal/sessions/verify", first))).await;
        assert_eq!(status, StatusCode::OK);
        let user_id = body["userId"].as_i64().unwrap();

        let second = json!({ "authToken": token, "telegramUserId": 2, "telegramUsername": "mallory" });
        let (status, _, body) = send(&app, as_worker(json_req("POST", "/internal/sessions/verify", second))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let (_, _, body) = send(&app, json_req("POST", "/auth/status", json!({ "authToken": token }))).await;
        assert_eq!(body, json!({ "verified": true, "userId": user_id, "telegramUsername": "ada" }));
    }

    #[tokio::test]
    async fn list_hides_unready_videos() {
        let state = test_state();
        let app = router(state.clone());
        let (cookie, user_id) = sign_in(&app, 7).await;

        for (i, status) in [VideoStatus::Downloading, VideoStatus::Failed, VideoStatus::Downloading]
            .into_iter()
            .enumerate()
        {
            state
                .db
                .create_video(&NewVideo {
                    user_id,
                    youtube_id: format!("vid{}", i),
                    status,
                    file: VideoFile {
                        title: "t".into(),
                        file_key: "k".into(),
                        file_url: "u".into(),
                        ..Default::default()
                    },
                })
                .unwrap();
        }

        let (status, _, body) = send(&app, with_cookie(empty("GET", "/videos"), &cookie)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn foreign_video_looks_missing() {
        let state = test_state();
        let app = router(state.clone());
        let (cookie, _) = sign_in(&app, 7).await;

        let owner = state
            .db
            .upsert_user("telegram_99", &UserFields::default(), None)
            .unwrap();
        let video = state
            .db
            .create_video(&NewVideo {
                user_id: owner.id,
                youtube_id: "abc".into(),
                status: VideoStatus::Ready,
                file: VideoFile {
                    title: "t".into(),
                    file_key: "k".into(),
                    file_url: "u".into(),
                    ..Default::default()
                },
            })
            .unwrap();

        let foreign = format!("/videos/{}", video.id);
        let missing = format!("/videos/{}", video.id + 1000);

        for method in ["GET", "DELETE"] {
            let (s1, _, b1) = send(&app, with_cookie(empty(method, &foreign), &cookie)).await;
            let (s2, _, b2) = send(&app, with_cookie(empty(method, &missing), &cookie)).await;
            assert_eq!(s1, StatusCode::NOT_FOUND);
            assert_eq!(s1, s2);
            assert_eq!(b1, b2);
        }
        assert!(state.db.get_video(video.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn owner_can_delete_video() {
        let state = test_state();
        let app = router(state.clone());
        let (cookie, user_id) = sign_in(&app, 7).await;

        let video = state
            .db
            .create_video(&NewVideo {
                user_id,
                youtube_id: "abc".into(),
                status: VideoStatus::Ready,
                file: VideoFile {
                    title: "t".into(),
                    file_key: "k".into(),
                    file_url: "u".into(),
                    ..Default::default()
                },
            })
            .unwrap();

        let uri = format!("/videos/{}", video.id);
        let (status, _, body) = send(&app, with_cookie(empty("GET", &uri), &cookie)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["youtubeId"], "abc");

        let (status, _, body) = send(&app, with_cookie(empty("DELETE", &uri), &cookie)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, _, _) = send(&app, with_cookie(empty("GET", &uri), &cookie)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = router(test_state());
        let (status, _, body) = send(&app, empty("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }
}
