use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::Duration;
use log::debug;

use crate::{
    auth::{JwtClaims, Role, TokenIssuer, TokenVerifier},
    config::AuthConfig,
    middleware::JwtMiddlewareFactory,
};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-tests-secret-never-use-in-production").unwrap()
}

pub fn issue_token(sub: &str, role: Role, valid_for: Duration) -> String {
    let claims = JwtClaims::new(sub, role);
    TokenIssuer::new(&get_auth_config()).issue_token(&claims, valid_for).expect("Failed to sign token")
}

pub fn valid_token(sub: &str, role: Role) -> String {
    issue_token(sub, role, Duration::hours(1))
}

pub async fn get_request<F>(token: &str, path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send(TestRequest::get().uri(path), token, configure).await
}

pub async fn post_request<F>(token: &str, path: &str, body: serde_json::Value, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send(TestRequest::post().uri(path).set_json(body), token, configure).await
}

pub async fn put_request<F>(token: &str, path: &str, body: serde_json::Value, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send(TestRequest::put().uri(path).set_json(body), token, configure).await
}

async fn send<F>(mut req: TestRequest, token: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    let verifier = TokenVerifier::new(&get_auth_config());
    let app = App::new().wrap(JwtMiddlewareFactory::new(verifier)).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    // Middleware refusals surface as service errors, so render them the way the server would
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.map_into_boxed_body().into_parts().1,
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
