mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::{json, Value};

use common::TestServer;
use helpdesk_api::auth::Role;

#[tokio::test]
async fn health_endpoints_respond() -> Result<()> {
    let server = TestServer::start().await?;

    for path in ["/healthz", "/api/healthz"] {
        let res = server.get(path, None).await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.json::<Value>().await?;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"]["backend"], "memory");
        assert_eq!(body["store"]["capabilities"]["advancedQuery"], true);
    }
    Ok(())
}

#[tokio::test]
async fn register_forces_end_user() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .post(
            "/api/auth/register",
            None,
            json!({"email": "New@Example.com", "name": "New", "password": "secret1", "role": "admin"}),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["role"], "end_user");
    assert_eq!(body["email"], "new@example.com");
    assert!(body.get("passwordHash").is_none());
    Ok(())
}

#[tokio::test]
async fn register_rejects_bad_input_and_duplicates() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .post("/api/auth/register", None, json!({"email": "a@x.io", "name": "A", "password": "123"}))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = json!({"email": "a@x.io", "name": "A", "password": "123456"});
    let res = server.post("/api/auth/register", None, body.clone()).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = server.post("/api/auth/register", None, body).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_400() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.url("/api/auth/login"))
        .header(header::CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "invalid json");
    assert_eq!(body["code"], "INVALID_JSON");
    Ok(())
}

#[tokio::test]
async fn login_sets_http_only_session_cookie() -> Result<()> {
    let server = TestServer::start().await?;
    let user = server.seed_user("agent@x.io", Role::Agent).await?;

    let res = server
        .post(
            "/api/auth/login",
            None,
            json!({"email": "agent@x.io", "password": common::PASSWORD}),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let set_cookie = common::raw_session_set_cookie(&res).expect("session cookie");
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=86400"));

    let body = res.json::<Value>().await?;
    assert_eq!(body["id"], user.id.to_string());
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_401() -> Result<()> {
    let server = TestServer::start().await?;
    server.seed_user("agent@x.io", Role::Agent).await?;

    for (email, password) in [("agent@x.io", "wrong-password"), ("nobody@x.io", common::PASSWORD)] {
        let res = server
            .post("/api/auth/login", None, json!({"email": email, "password": password}))
            .await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = res.json::<Value>().await?;
        assert_eq!(body["error"], "invalid credentials");
    }
    Ok(())
}

#[tokio::test]
async fn me_requires_session() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.get("/api/auth/me", None).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (user, cookie) = server.seed_and_login("me@x.io", Role::Supervisor).await?;
    let res = server.get("/api/auth/me", Some(&cookie)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["role"], "supervisor");
    Ok(())
}

#[tokio::test]
async fn bearer_token_works_like_the_cookie() -> Result<()> {
    let server = TestServer::start().await?;
    let (user, cookie) = server.seed_and_login("me@x.io", Role::Agent).await?;
    let token = cookie.trim_start_matches("session=");

    let res = server
        .client
        .get(server.url("/api/auth/me"))
        .bearer_auth(token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["id"], user.id.to_string());
    Ok(())
}

#[tokio::test]
async fn garbage_session_is_anonymous_and_cleared() -> Result<()> {
    let server = TestServer::start().await?;

    // Public read still succeeds with a bogus cookie.
    let res = server.get("/api/tickets", Some("session=garbage.token.value")).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let cleared = common::raw_session_set_cookie(&res).expect("clearing cookie");
    assert!(cleared.starts_with("session=;"));
    assert!(cleared.contains("Max-Age=0"));

    // Protected route treats the caller as anonymous.
    let res = server.get("/api/auth/me", Some("session=garbage.token.value")).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_clears_cookie() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, cookie) = server.seed_and_login("me@x.io", Role::Agent).await?;

    let res = server.post("/api/auth/logout", Some(&cookie), json!({})).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let cleared = common::raw_session_set_cookie(&res).expect("clearing cookie");
    assert!(cleared.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn login_over_stale_session_keeps_the_new_cookie() -> Result<()> {
    let server = TestServer::start().await?;
    let user = server.seed_user("agent@x.io", Role::Agent).await?;

    let res = server
        .post(
            "/api/auth/login",
            Some("session=expired-or-garbage"),
            json!({"email": "agent@x.io", "password": common::PASSWORD}),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let session_headers: Vec<String> = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with("session="))
        .map(str::to_string)
        .collect();
    let last = session_headers.last().expect("session cookie");
    assert!(!last.contains("Max-Age=0"));

    let cookie = common::session_cookie(&res).expect("fresh session");
    let res = server.get("/api/auth/me", Some(&cookie)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["id"], user.id.to_string());
    Ok(())
}
