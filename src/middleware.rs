//! Actix-Web middleware for Raven
//!
//! Makes the in-flight request available to the [`RavenClient`] while the
//! handler runs, and reports handler errors and 5xx responses as events.
//! It never blocks or modifies requests: events are sent in the background.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::client::RavenClient;
use crate::context::{InboundRequest, TaskLocalRequest};
use crate::error::BodyReadError;
use crate::packet::{JsonPacket, Level};
use crate::request_body_capture::{capture_request_body, extract_request_headers};
use crate::utils::remote_addr;

/// Raven middleware for Actix-Web
///
/// Add this middleware to your Actix app via `.wrap()`:
///
/// ```rust,no_run
/// use actix_web::App;
/// use raven_actix::RavenMiddleware;
///
/// let app = App::new().wrap(RavenMiddleware::new());
/// ```
pub struct RavenMiddleware {
    client: Arc<RavenClient>,
}

impl RavenMiddleware {
    /// Middleware with a client configured from the environment
    pub fn new() -> Self {
        Self::with_client(RavenClient::from_env().into_arc())
    }

    /// Share an existing client, e.g. one also registered as app data
    pub fn with_client(client: Arc<RavenClient>) -> Self {
        Self { client }
    }
}

impl Default for RavenMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RavenMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RavenMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RavenMiddlewareService {
            service: Rc::new(service),
            client: self.client.clone(),
        })
    }
}

/// The actual service that handles each request
pub struct RavenMiddlewareService<S> {
    service: Rc<S>,
    client: Arc<RavenClient>,
}

impl<S, B> Service<ServiceRequest> for RavenMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        // Skip capture entirely if SDK is inactive (missing config)
        if !self.client.is_active() {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let service = self.service.clone();
        let client = self.client.clone();

        Box::pin(async move {
            let body = capture_request_body(&mut req).await;
            let inbound = inbound_request(&req, body);
            let route = format!("{} {}", req.method(), req.path());

            TaskLocalRequest::scope(inbound, async move {
                let result = service.call(req).await;

                match &result {
                    Ok(res) if res.status().is_server_error() => {
                        let message = match res.response().error() {
                            Some(e) => e.to_string(),
                            None => format!("{} returned {}", route, res.status()),
                        };
                        capture_failure(&client, message, route);
                    }
                    Err(e) if e.as_response_error().status_code().is_server_error() => {
                        capture_failure(&client, e.to_string(), route);
                    }
                    _ => {}
                }

                result
            })
            .await
        })
    }
}

fn capture_failure(client: &RavenClient, message: String, route: String) {
    let packet = JsonPacket::with_message(message, Level::Error).culprit(route);
    // Still inside the request scope, so the context is captured here
    let _ = client.spawn_capture(packet);
}

/// Build the framework-neutral view of an Actix request
fn inbound_request(
    req: &ServiceRequest,
    body: Option<Result<actix_web::web::Bytes, BodyReadError>>,
) -> InboundRequest {
    let mut inbound = InboundRequest::new(req.method().as_str(), req.path());

    inbound.headers = req
        .headers()
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
        .collect();

    if let Ok(cookies) = req.request().cookies() {
        inbound.cookies = cookies
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
    }

    inbound.query_string = Some(req.query_string().to_string());

    let headers = extract_request_headers(req);
    if let Some(ip) = remote_addr(&headers, req.peer_addr().map(|addr| addr.ip())) {
        inbound.env.insert("REMOTE_ADDR".to_string(), ip.to_string());
    }
    inbound
        .env
        .insert("SERVER_NAME".to_string(), req.connection_info().host().to_string());
    inbound
        .env
        .insert("SERVER_PROTOCOL".to_string(), format!("{:?}", req.version()));

    if let Some(body) = body {
        inbound = inbound.body(body);
    }

    inbound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use actix_web::{test, web, App, HttpResponse};

    fn inactive_client() -> Arc<RavenClient> {
        RavenClient::new(Config::new(None)).into_arc()
    }

    fn unreachable_client() -> Arc<RavenClient> {
        RavenClient::new(Config::new(Some("http://pk@127.0.0.1:9/1".to_string()))).into_arc()
    }

    #[actix_rt::test]
    async fn test_middleware_with_inactive_config() {
        let app = test::init_service(
            App::new()
                .wrap(RavenMiddleware::with_client(inactive_client()))
                .route("/test", web::get().to(|| async { HttpResponse::Ok().body("test") })),
        )
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
    }

    #[actix_rt::test]
    async fn test_handler_still_reads_body() {
        let app = test::init_service(
            App::new()
                .wrap(RavenMiddleware::with_client(unreachable_client()))
                .route("/echo", web::post().to(|body: String| async move { HttpResponse::Ok().body(body) })),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/echo")
            .insert_header(("content-type", "text/plain"))
            .set_payload("hello raven")
            .to_request();
        let body = test::call_and_read_body(&app, req).await;

        assert_eq!(body, "hello raven".as_bytes());
    }

    #[actix_rt::test]
    async fn test_server_error_does_not_break_response() {
        let app = test::init_service(
            App::new()
                .wrap(RavenMiddleware::with_client(unreachable_client()))
                .route(
                    "/fail",
                    web::get().to(|| async { HttpResponse::InternalServerError().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::get().uri("/fail").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status().as_u16(), 500);
    }

    #[actix_rt::test]
    async fn test_inbound_request_conversion() {
        let req = test::TestRequest::post()
            .uri("/orders?page=2")
            .insert_header(("x-forwarded-for", "203.0.113.9, 10.0.0.1"))
            .insert_header(("cookie", "theme=dark"))
            .peer_addr("127.0.0.1:5000".parse().unwrap())
            .to_srv_request();

        let inbound = inbound_request(&req, None);

        assert_eq!(inbound.method, "POST");
        assert_eq!(inbound.path, "/orders");
        assert_eq!(inbound.query_string.as_deref(), Some("page=2"));
        assert_eq!(inbound.cookies, vec![("theme".to_string(), "dark".to_string())]);
        assert_eq!(inbound.env["REMOTE_ADDR"], "203.0.113.9");
        assert!(inbound.body.is_none());
    }

    #[actix_rt::test]
    async fn test_middleware_creation() {
        let middleware = RavenMiddleware::new();
        let _ = middleware.client.is_active();
    }
}
