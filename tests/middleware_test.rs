//! Actix integration: request context flows into captured events

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App, HttpResponse};
use flate2::read::GzDecoder;
use raven_actix::{Config, JsonPacket, Level, RavenClient, RavenMiddleware};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn store_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/7/store/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"evt-1"}"#))
        .mount(&server)
        .await;
    server
}

fn client_for(server: &MockServer) -> Arc<RavenClient> {
    RavenClient::new(Config::new(Some(format!("http://pk:sk@{}/7", server.address())))).into_arc()
}

fn decode(request: &Request) -> Value {
    let mut text = String::new();
    GzDecoder::new(&request.body[..]).read_to_string(&mut text).unwrap();
    serde_json::from_str(&text).unwrap()
}

/// Events from the middleware are sent in the background
async fn wait_for_events(server: &MockServer, count: usize) -> Vec<Request> {
    for _ in 0..50 {
        let requests = server.received_requests().await.unwrap();
        if requests.len() >= count {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {count} event(s) to reach the store endpoint");
}

async fn checkout(client: web::Data<Arc<RavenClient>>, body: String) -> HttpResponse {
    let id = client
        .capture_event(JsonPacket::with_message("checkout rejected", Level::Warning))
        .await;
    HttpResponse::Ok().body(format!("{}|{}", id.unwrap_or_default(), body))
}

#[actix_rt::test]
async fn test_handler_event_carries_request_context() {
    let server = store_server().await;
    let client = client_for(&server);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(client.clone()))
            .wrap(RavenMiddleware::with_client(client))
            .route("/checkout", web::post().to(checkout)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/checkout?step=2&api_key=k")
        .insert_header(("content-type", "application/json"))
        .insert_header(("authorization", "Bearer abc"))
        .set_payload(r#"{"card":"4111","password":"hunter2"}"#)
        .to_request();
    let body = test::call_and_read_body(&app, req).await;

    assert_eq!(
        body,
        r#"evt-1|{"card":"4111","password":"hunter2"}"#.as_bytes()
    );

    let requests = wait_for_events(&server, 1).await;
    let event = decode(&requests[0]);
    let request = &event["request"];

    assert_eq!(event["level"], "warning");
    assert_eq!(request["url"], "/checkout");
    assert_eq!(request["method"], "POST");
    assert_eq!(request["query_string"], "step=2&api_key=***");
    assert_eq!(request["headers"]["authorization"], "***");
    assert_eq!(request["data"]["card"], "4111");
    assert_eq!(request["data"]["password"], "***");
}

#[actix_rt::test]
async fn test_server_error_is_reported() {
    let server = store_server().await;

    let app = test::init_service(
        App::new()
            .wrap(RavenMiddleware::with_client(client_for(&server)))
            .route(
                "/fail",
                web::get().to(|| async { HttpResponse::ServiceUnavailable().finish() }),
            ),
    )
    .await;

    let req = test::TestRequest::get().uri("/fail").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 503);

    let requests = wait_for_events(&server, 1).await;
    let event = decode(&requests[0]);

    assert_eq!(event["level"], "error");
    assert_eq!(event["culprit"], "GET /fail");
    assert_eq!(event["request"]["url"], "/fail");
}

#[actix_rt::test]
async fn test_successful_request_sends_nothing() {
    let server = store_server().await;

    let app = test::init_service(
        App::new()
            .wrap(RavenMiddleware::with_client(client_for(&server)))
            .route("/", web::get().to(|| async { HttpResponse::Ok().body("fine") })),
    )
    .await;

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.received_requests().await.unwrap().is_empty());
}
