//! End-to-end sign-in flows: router, strategy, validator and parser against a
//! `wiremock` CAS server.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use http::{StatusCode, header};
use serde_json::Value;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use crate::{
    cas::{
        BoxError, CallbackRequest, CasStrategy, LogoutCallbackResult, ProtocolResponse,
        SingleSignOutHandler,
        logout::{NAME_ID_PARAM, SESSION_INDEX_PARAM},
    },
    config::{CasConfig, ServerConfig},
    routes::{
        AppState, router,
        test_support::{get, post_form, send},
    },
};

const SUCCESS: &str = include_str!("../../tests/fixtures/cas/cas_success.xml");
const SUCCESS_JASIG: &str = include_str!("../../tests/fixtures/cas/cas_success_jasig.xml");
const FAILURE: &str = include_str!("../../tests/fixtures/cas/cas_failure.xml");
const SAML_SUCCESS: &str = include_str!("../../tests/fixtures/cas/saml_success.xml");
const SAML_FAILURE: &str = include_str!("../../tests/fixtures/cas/saml_failure.xml");
const LOGOUT_REQUEST: &str = include_str!("../../tests/fixtures/cas/logout_request.xml");

const SERVICE: &str = "http://localhost:8080/auth/cas/callback";

fn app_for(config: CasConfig) -> Router {
    let strategy = CasStrategy::new(config).unwrap();
    router(AppState::new(strategy, ServerConfig::default()))
}

async fn mount_validation(server: &MockServer, service: &str, ticket: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path("/cas/serviceValidate"))
        .and(query_param("service", service))
        .and(query_param("ticket", ticket))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

fn cas_config(server: &MockServer) -> CasConfig {
    CasConfig::for_url(format!("{}/cas", server.uri()))
}

#[tokio::test]
async fn test_valid_ticket_yields_identity() {
    let server = MockServer::start().await;
    mount_validation(&server, SERVICE, "ST-1", SUCCESS).await;

    let app = app_for(cas_config(&server));
    let (response, body) = send(&app, get("/auth/cas/callback?ticket=ST-1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let identity: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(identity["provider"], "cas");
    assert_eq!(identity["uid"], "psegel");
    assert_eq!(identity["info"]["name"], "Peter Segel");
    assert_eq!(identity["info"]["email"], "psegel@intridea.com");
    assert_eq!(identity["info"]["nickname"], "psegel");
    assert_eq!(identity["info"]["location"], "Washington, D.C.");
    assert_eq!(identity["extra"]["employeeid"], "54");
    assert_eq!(identity["extra"]["roles"], "financier");
    assert!(identity["extra"].get("email").is_none());
    assert!(identity["extra"].get("proxies").is_none());
    assert_eq!(identity["credentials"]["ticket"], "ST-1");
}

#[tokio::test]
async fn test_jasig_attributes_with_merged_roles() {
    let server = MockServer::start().await;
    mount_validation(&server, SERVICE, "ST-2", SUCCESS_JASIG).await;

    let config = CasConfig {
        merge_multivalued_attributes: true,
        uid_field: "employeeid".into(),
        ..cas_config(&server)
    };
    let (response, body) = send(&app_for(config), get("/auth/cas/callback?ticket=ST-2")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let identity: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(identity["uid"], "54");
    assert_eq!(
        identity["extra"]["roles"],
        serde_json::json!(["senator", "lobbyist", "financier"])
    );
}

#[tokio::test]
async fn test_return_url_is_part_of_service() {
    let server = MockServer::start().await;
    let service = format!("{SERVICE}?url=%2Fhome");
    mount_validation(&server, &service, "ST-3", SUCCESS).await;

    let (response, _) = send(
        &app_for(cas_config(&server)),
        get("/auth/cas/callback?url=%2Fhome&ticket=ST-3"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rejected_ticket_redirects_to_failure() {
    let server = MockServer::start().await;
    mount_validation(&server, SERVICE, "ST-9391d", FAILURE).await;

    let (response, _) = send(
        &app_for(cas_config(&server)),
        get("/auth/cas/callback?ticket=ST-9391d"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/failure?message=invalid_ticket&strategy=cas"
    );
}

#[tokio::test]
async fn test_garbage_response_redirects_to_failure() {
    let server = MockServer::start().await;
    mount_validation(&server, SERVICE, "ST-4", "<html>Service Unavailable").await;

    let app = app_for(cas_config(&server));
    let (response, _) = send(&app, get("/auth/cas/callback?ticket=ST-4")).await;

    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/failure?message=invalid_ticket&strategy=cas"
    );
}

#[tokio::test]
async fn test_missing_uid_redirects_to_failure() {
    let server = MockServer::start().await;
    mount_validation(&server, SERVICE, "ST-5", SUCCESS).await;

    let config = CasConfig {
        uid_field: "badge".into(),
        ..cas_config(&server)
    };
    let (response, _) = send(&app_for(config), get("/auth/cas/callback?ticket=ST-5")).await;

    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/failure?message=invalid_ticket&strategy=cas"
    );
}

#[tokio::test]
async fn test_unreachable_server_is_bad_gateway() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = CasConfig {
        ssl: false,
        port: Some(port),
        ..CasConfig::for_host("127.0.0.1")
    };
    let (response, body) = send(&app_for(config), get("/auth/cas/callback?ticket=ST-6")).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "cas_unavailable");
    assert!(!body.contains("ST-6"));
}

#[tokio::test]
async fn test_saml_validation_flow() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cas/login"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Date", "Tue, 13 Jul 2004 12:00:00 GMT"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cas/samlValidate"))
        .and(query_param("TARGET", SERVICE))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAML_SUCCESS))
        .expect(1)
        .mount(&server)
        .await;

    let config = CasConfig {
        saml: true,
        ..cas_config(&server)
    };
    let (response, body) = send(&app_for(config), get("/auth/cas/callback?ticket=ST-7")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let identity: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(identity["uid"], "psegel");
    assert_eq!(identity["info"]["email"], "psegel@intridea.com");

    let requests = server.received_requests().await.unwrap();
    let envelope = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .unwrap();
    assert!(envelope.contains("<samlp:AssertionArtifact>ST-7</samlp:AssertionArtifact>"));
}

#[tokio::test]
async fn test_saml_denied_redirects_to_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cas/samlValidate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAML_FAILURE))
        .mount(&server)
        .await;

    let config = CasConfig {
        saml: true,
        ..cas_config(&server)
    };
    let (response, _) = send(&app_for(config), get("/auth/cas/callback?ticket=ST-1")).await;

    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/failure?message=invalid_ticket&strategy=cas"
    );
}

/// Records the parameters it was called with and ends the session with a 202.
#[derive(Default)]
struct SessionStore {
    ended: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SingleSignOutHandler for SessionStore {
    async fn on_single_sign_out(
        &self,
        request: &CallbackRequest,
        _options: &CasConfig,
    ) -> Result<Option<LogoutCallbackResult>, BoxError> {
        self.ended.lock().unwrap().push((
            request.param(NAME_ID_PARAM).unwrap_or_default().to_string(),
            request.param(SESSION_INDEX_PARAM).unwrap_or_default().to_string(),
        ));
        Ok(Some(LogoutCallbackResult::Response(ProtocolResponse::new(
            StatusCode::ACCEPTED,
            "session ended",
        ))))
    }
}

#[tokio::test]
async fn test_single_sign_out_reaches_handler() {
    let server = MockServer::start().await;
    let store = Arc::new(SessionStore::default());
    let strategy = CasStrategy::new(cas_config(&server))
        .unwrap()
        .with_single_sign_out(store.clone());
    let app = router(AppState::new(strategy, ServerConfig::default()));

    let (response, body) = send(
        &app,
        post_form("/auth/cas/callback", &[("logoutRequest", LOGOUT_REQUEST)]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body, "session ended");
    assert_eq!(
        *store.ended.lock().unwrap(),
        vec![(
            "@NOT_USED@".to_string(),
            "ST-123456-123abc456def".to_string()
        )]
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}
