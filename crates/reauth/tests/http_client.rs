//! End-to-end tests for the default client over real HTTP.
//!
//! A `mockito` server plays the backend: it hands out the refresh cookie
//! at login, expects it back on the renewal call, and only accepts the
//! renewed credential on replays.

use std::sync::Arc;

use mockito::{Matcher, Server};
use reauth::{ChannelNavigator, Client, ClientError, ExpiryReason, SessionCookies};
use serde_json::json;

const HOST: &str = "127.0.0.1";

type Routes = tokio::sync::mpsc::UnboundedReceiver<String>;

fn client_for(server: &Server) -> (Client, Arc<SessionCookies>, Routes) {
    let cookies = Arc::new(SessionCookies::new());
    let (navigator, routes) = ChannelNavigator::new();
    let client = Client::builder()
        .base_url(format!("{}/api", server.url()))
        .cookies(Arc::clone(&cookies))
        .navigator(navigator)
        .build()
        .expect("client should build");
    (client, cookies, routes)
}

#[tokio::test]
async fn test_get_expired_credential_renews_with_cookie_and_replays() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/api/auth/login")
        .match_body(Matcher::Json(json!({ "email": "dev@market.test", "password": "hunter2" })))
        .with_status(200)
        .with_header("set-cookie", "refreshToken=r1; HttpOnly; Path=/")
        .with_body(r#"{"accessToken":"T1"}"#)
        .create_async()
        .await;
    let expired = server
        .mock("GET", "/api/auth/me")
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let renewal = server
        .mock("POST", "/api/auth/token")
        .match_header("cookie", "refreshToken=r1")
        .match_header("content-type", "application/json")
        .match_body(Matcher::JsonString("{}".into()))
        .with_status(200)
        .with_body(r#"{"accessToken":"T2"}"#)
        .expect(1)
        .create_async()
        .await;
    let replay = server
        .mock("GET", "/api/auth/me")
        .match_header("authorization", "Bearer T2")
        .with_status(200)
        .with_body(r#"{"id":"u1"}"#)
        .expect(1)
        .create_async()
        .await;

    let (client, cookies, _routes) = client_for(&server);

    client
        .post_json(
            "/auth/login",
            &json!({ "email": "dev@market.test", "password": "hunter2" }),
        )
        .await
        .expect("login should succeed");
    assert!(cookies.get(HOST, "refreshToken").is_some());

    let me = client.get("/auth/me").await.expect("replay should succeed");

    assert_eq!(me.status(), 200);
    assert_eq!(me.text(), r#"{"id":"u1"}"#);
    login.assert_async().await;
    expired.assert_async().await;
    renewal.assert_async().await;
    replay.assert_async().await;
    assert_eq!(client.teardown().invalidations(), 0);
}

#[tokio::test]
async fn test_get_forbidden_renewal_clears_cookies_and_navigates_to_login() {
    let mut server = Server::new_async().await;
    let expired = server
        .mock("GET", "/api/project/projects/my")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let renewal = server
        .mock("POST", "/api/auth/token")
        .with_status(403)
        .expect(1)
        .create_async()
        .await;

    let (client, cookies, mut routes) = client_for(&server);
    cookies.store(HOST, "refreshToken=stale; HttpOnly; Path=/");

    let result = client.get("/project/projects/my").await;

    assert!(matches!(
        result,
        Err(ClientError::AuthExpired {
            reason: ExpiryReason::RenewalRejected { status: 403 },
            ..
        })
    ));
    expired.assert_async().await;
    renewal.assert_async().await;
    assert!(cookies.is_empty());
    assert_eq!(routes.try_recv().ok().as_deref(), Some("/login"));
    assert_eq!(client.teardown().invalidations(), 1);
}

#[tokio::test]
async fn test_get_not_found_passes_through_without_renewal() {
    let mut server = Server::new_async().await;
    let _missing = server
        .mock("GET", "/api/project/projects/9")
        .with_status(404)
        .with_body("project not found")
        .create_async()
        .await;
    let renewal = server
        .mock("POST", "/api/auth/token")
        .expect(0)
        .create_async()
        .await;

    let (client, _cookies, mut routes) = client_for(&server);

    let err = client.get("/project/projects/9").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    match err {
        ClientError::Rejected { response, .. } => assert_eq!(response.text(), "project not found"),
        other => panic!("expected Rejected, got {other:?}"),
    }
    renewal.assert_async().await;
    assert!(routes.try_recv().is_err());
}

#[tokio::test]
async fn test_logout_invalidates_server_and_local_session() {
    let mut server = Server::new_async().await;
    let logout = server
        .mock("POST", "/api/auth/logout")
        .match_header("cookie", Matcher::Regex("refreshToken=r1".into()))
        .with_status(200)
        .with_header("set-cookie", "refreshToken=; Max-Age=0; Path=/")
        .expect(1)
        .create_async()
        .await;

    let (client, cookies, mut routes) = client_for(&server);
    cookies.store(HOST, "refreshToken=r1; HttpOnly; Path=/");
    cookies.store(HOST, "theme=dark");

    let response = client.logout().await.expect("logout should succeed");

    assert_eq!(response.status(), 200);
    logout.assert_async().await;
    assert!(cookies.is_empty());
    assert_eq!(routes.try_recv().ok().as_deref(), Some("/login"));
    assert_eq!(client.teardown().invalidations(), 1);
}
