use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{App, test};
use serde_json::{Value, json};

use lottery_backend::config::{Config, SecurityConfig};
use lottery_backend::external::Notifier;
use lottery_backend::middlewares::AuthMiddleware;
use lottery_backend::storage::MemoryStore;
use lottery_backend::AppServices;

fn services() -> AppServices {
    let config = Config {
        security: SecurityConfig {
            bcrypt_cost: 4,
            ..SecurityConfig::default()
        },
        ..Config::default()
    };
    AppServices::assemble(&config, Arc::new(MemoryStore::new()), Notifier::outbox()).unwrap()
}

/// Sends a request and returns the status with the decoded JSON body.
/// Middleware rejections come back as `Err` and are rendered like the server would.
async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match app.call(req).await {
        Ok(resp) => {
            let status = resp.status();
            let body = test::read_body(resp).await;
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
        Err(e) => (e.error_response().status(), Value::Null),
    }
}

macro_rules! app {
    ($services:expr) => {{
        let services = $services.clone();
        test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(services.account_service.clone()))
                .configure(move |cfg| services.configure(cfg)),
        )
        .await
    }};
}

/// Logs in and returns the access token.
macro_rules! login {
    ($app:expr, $email:expr, $password:expr) => {{
        let (status, body) = send(
            $app,
            test::TestRequest::post()
                .uri("/api/v1/auth/login")
                .set_json(json!({ "email": $email, "password": $password }))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"]["access_token"].as_str().unwrap().to_string()
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

#[actix_web::test]
async fn test_register_buy_draw_and_see_result() {
    let services = services();
    let app = app!(services);

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "Passw0rd1"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "user");
    assert!(body["data"].get("password_hash").is_none());

    let alice = login!(&app, "alice@example.com", "Passw0rd1");

    let (status, body) = send(
        &app,
        test::TestRequest::get().uri("/api/v1/lotteries/1").to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/tickets")
            .insert_header(bearer(&alice))
            .set_json(json!({ "lottery_id": "1", "ticket_number": "12-34-56-78-90" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["price"], 500);

    let admin = login!(&app, "admin@example.com", "admin123");
    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/admin/lotteries/1/draw")
            .insert_header(bearer(&admin))
            .set_json(json!({ "winning_number": "12-34-56-78-90" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lottery"]["status"], "drawn");
    assert_eq!(body["data"]["winning_tickets"], 1);

    let (_, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/tickets")
            .insert_header(bearer(&alice))
            .to_request(),
    )
    .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["data"][0]["status"], "won");

    let (_, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/user/results")
            .insert_header(bearer(&alice))
            .to_request(),
    )
    .await;
    assert_eq!(body["data"][0]["lottery_id"], "1");
    assert_eq!(body["data"][0]["won"], true);

    // 重复开奖
    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/admin/lotteries/1/draw")
            .insert_header(bearer(&admin))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_DRAWN");
}

#[actix_web::test]
async fn test_protected_routes_require_token_and_role() {
    let services = services();
    let app = app!(services);

    let (status, _) = send(
        &app,
        test::TestRequest::get().uri("/api/v1/tickets").to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user = login!(&app, "user@example.com", "user123");
    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/admin/lotteries/3/draw")
            .insert_header(bearer(&user))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/tickets")
            .insert_header(bearer(&user))
            .set_json(json!({ "lottery_id": "2" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "LOTTERY_CLOSED");
}

#[actix_web::test]
async fn test_malformed_draw_body_leaves_lottery_open() {
    let services = services();
    let app = app!(services);
    let admin = login!(&app, "admin@example.com", "admin123");

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/admin/lotteries/3/draw")
            .insert_header(bearer(&admin))
            .set_json(json!({ "winning_number": 1234567890 }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/admin/lotteries/3/draw")
            .insert_header(bearer(&admin))
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, body) = send(
        &app,
        test::TestRequest::get().uri("/api/v1/lotteries/3").to_request(),
    )
    .await;
    assert_eq!(body["data"]["status"], "active");
}

#[actix_web::test]
async fn test_logout_revokes_access_token() {
    let services = services();
    let app = app!(services);

    let token = login!(&app, "user@example.com", "user123");
    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/user/profile")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["statistics"]["total_tickets"], 3);

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/logout")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/user/profile")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_password_reset_link_flow() {
    let services = services();
    let app = app!(services);

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/password-reset/request")
            .set_json(json!({ "email": "nobody@example.com" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "ACCOUNT_NOT_FOUND");

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/password-reset/request")
            .set_json(json!({ "email": "user@example.com" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = services
        .account_service
        .notifier()
        .last_sent_to("user@example.com")
        .and_then(|n| n.secret)
        .unwrap();

    let complete = |token: &str| {
        test::TestRequest::post()
            .uri("/api/v1/auth/password-reset/complete")
            .set_json(json!({
                "email": "user@example.com",
                "token": token,
                "new_password": "brand-new"
            }))
            .to_request()
    };

    let (status, body) = send(&app, complete("wrong-token")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");

    let (status, _) = send(&app, complete(token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    login!(&app, "user@example.com", "brand-new");

    let (status, body) = send(&app, complete(token.as_str())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "NO_RESET_REQUEST");
}

#[actix_web::test]
async fn test_otp_reset_endpoints() {
    let services = services();
    let app = app!(services);

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/send-otp")
            .set_json(json!({ "email": "ghost@example.com" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/verify-otp")
            .set_json(json!({
                "email": "user@example.com",
                "otp": "123456",
                "newPassword": "otp-pass"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/send-otp")
            .set_json(json!({ "email": "user@example.com" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let otp = services
        .account_service
        .notifier()
        .last_sent_to("user@example.com")
        .and_then(|n| n.secret)
        .unwrap();

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/verify-otp")
            .set_json(json!({
                "email": "user@example.com",
                "otp": otp,
                "newPassword": "otp-pass"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login!(&app, "user@example.com", "otp-pass");
}

#[actix_web::test]
async fn test_public_listing_and_swagger() {
    let services = services();
    let app = app!(services);

    let (status, body) = send(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/lotteries?status=active")
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, body) = send(
        &app,
        test::TestRequest::get().uri("/api/v1/lotteries/42").to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "LOTTERY_NOT_FOUND");

    let (status, body) = send(
        &app,
        test::TestRequest::get().uri("/api-docs/openapi.json").to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/send-otp").is_some());
}
