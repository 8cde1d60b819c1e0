use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use http_response_filters::{
    CacheControl, FilterLayer, FiltersConfig, Newline, NoCache, ResponseContext, ResponseFilter,
    SecureTransport, StrictTransportSecurity, WhitespaceBody, WhitespaceLayer,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::{ServiceBuilder, ServiceExt, service_fn};

const PAGE: &str = "<html>\n\n\t\t<body>   </body>\n\n</html>";

type Handled = std::future::Ready<Result<Response<Full<Bytes>>, Infallible>>;

fn respond(content_type: &'static str, body: &'static str) -> impl Fn(Request<()>) -> Handled {
    move |_req| {
        let response = Response::builder()
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, body.len())
            .header(header::CACHE_CONTROL, "private")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();
        std::future::ready(Ok(response))
    }
}

fn https_request() -> Request<()> {
    Request::builder()
        .uri("https://example.com/")
        .body(())
        .unwrap()
}

fn http_request() -> Request<()> {
    Request::builder()
        .uri("http://example.com/")
        .body(())
        .unwrap()
}

#[derive(Debug)]
struct MovedTo(&'static str);

impl ResponseFilter for MovedTo {
    fn before_handler(&self, cx: &mut ResponseContext<'_>) {
        cx.redirect_permanent(HeaderValue::from_static(self.0));
    }
}

#[tokio::test]
async fn test_html_is_compacted_end_to_end() {
    let service = ServiceBuilder::new()
        .layer(FilterLayer::new())
        .layer(WhitespaceLayer::new().newline(Newline::Lf))
        .service(service_fn(respond("text/html; charset=utf-8", PAGE)));

    let response = service.oneshot(http_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "<html><body></body></html>\n");
}

#[tokio::test]
async fn test_json_passes_through() {
    let json = "{ \"a\":   1,\n\n\t\t\"b\": 2 }";
    let service = ServiceBuilder::new()
        .layer(WhitespaceLayer::new())
        .service(service_fn(respond("application/json", json)));

    let response = service.oneshot(http_request()).await.unwrap();

    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        &json.len().to_string()
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, json);
}

#[tokio::test]
async fn test_stacked_layers_compact_once() {
    let service = ServiceBuilder::new()
        .layer(WhitespaceLayer::new().newline(Newline::Lf))
        .layer(WhitespaceLayer::new().newline(Newline::Lf))
        .service(service_fn(respond("text/html", PAGE)));

    let response = service.oneshot(http_request()).await.unwrap();
    assert!(matches!(response.body(), WhitespaceBody::Passthrough { .. }));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "<html><body></body></html>\n");
}

#[tokio::test]
async fn test_disabled_layer_passes_html_through() {
    let service = ServiceBuilder::new()
        .layer(WhitespaceLayer::new().enabled(false))
        .service(service_fn(respond("text/html", PAGE)));

    let response = service.oneshot(http_request()).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, PAGE);
}

#[tokio::test]
async fn test_redirect_skips_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = {
        let calls = calls.clone();
        service_fn(move |req: Request<()>| {
            calls.fetch_add(1, Ordering::SeqCst);
            respond("text/html", PAGE)(req)
        })
    };

    let service = ServiceBuilder::new()
        .layer(FilterLayer::new().filter(MovedTo("/new")).filter(CacheControl::default()))
        .service(handler);

    let response = service.oneshot(http_request()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/new");
    assert!(response.headers().get(header::EXPIRES).is_none());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_header_filters_over_https() {
    let service = ServiceBuilder::new()
        .layer(
            FilterLayer::new()
                .filter(StrictTransportSecurity::new().include_subdomains(true))
                .filter(CacheControl::new(Duration::from_secs(60)).unwrap()),
        )
        .layer(WhitespaceLayer::new().newline(Newline::Lf))
        .service(service_fn(respond("text/html", PAGE)));

    let response = service.oneshot(https_request()).await.unwrap();
    let headers = response.headers();

    assert_eq!(
        headers.get(header::STRICT_TRANSPORT_SECURITY).unwrap(),
        "max-age=31536000; includeSubDomains"
    );
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=60, must-revalidate, proxy-revalidate"
    );
    assert!(headers.get(header::EXPIRES).is_some());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "<html><body></body></html>\n");
}

#[tokio::test]
async fn test_hsts_needs_secure_transport() {
    let layer = FilterLayer::new().filter(StrictTransportSecurity::new());

    let service = ServiceBuilder::new()
        .layer(layer.clone())
        .service(service_fn(respond("text/plain", "ok")));
    let response = service.oneshot(http_request()).await.unwrap();
    assert!(response.headers().get(header::STRICT_TRANSPORT_SECURITY).is_none());

    let mut request = http_request();
    request.extensions_mut().insert(SecureTransport);

    let service = ServiceBuilder::new()
        .layer(layer)
        .service(service_fn(respond("text/plain", "ok")));
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(header::STRICT_TRANSPORT_SECURITY).unwrap(),
        "max-age=31536000"
    );
}

#[tokio::test]
async fn test_no_cache_replaces_handler_headers() {
    let service = ServiceBuilder::new()
        .layer(FilterLayer::new().filter(NoCache))
        .service(service_fn(respond("text/plain", "ok")));

    let response = service.oneshot(http_request()).await.unwrap();
    let headers = response.headers();

    assert_eq!(
        headers.get_all(header::CACHE_CONTROL).iter().collect::<Vec<_>>(),
        ["no-cache, no-store, max-age=0, must-revalidate"]
    );
    assert_eq!(headers.get(header::PRAGMA).unwrap(), "no-cache");
    assert!(headers.get(header::EXPIRES).is_some());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_configured_stack() {
    let config: FiltersConfig = serde_json::from_str(
        r#"{
            "hsts": { "max_age_secs": 600 },
            "cache": { "duration_secs": 30 },
            "compact_html": true,
            "newline": "crlf"
        }"#,
    )
    .unwrap();

    let service = ServiceBuilder::new()
        .layer(config.filter_layer().unwrap())
        .layer(config.whitespace_layer())
        .service(service_fn(respond(
            "text/html",
            "<!DOCTYPE html>\n<html>  <p>hi</p>  </html>",
        )));

    let response = service.oneshot(https_request()).await.unwrap();

    assert_eq!(
        response.headers().get(header::STRICT_TRANSPORT_SECURITY).unwrap(),
        "max-age=600"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=30, must-revalidate, proxy-revalidate"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "<!DOCTYPE html>\r\n<html><p>hi</p></html>\r\n");
}
