use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};

/// Middleware layer function that appends permissive CORS headers to
/// responses and short-circuits OPTIONS preflight requests
///
/// `req`  The request to handle
/// `next` The next layer to use
pub async fn cors_layer(req: Request, next: Next) -> Response {
    let mut res: Response = if req.method() == Method::OPTIONS {
        // Preflight requests are answered without hitting the routes
        let mut res = Response::default();
        *res.status_mut() = StatusCode::NO_CONTENT;
        let headers = res.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("*"),
        );
        res
    } else {
        next.run(req).await
    };

    res.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    res
}
