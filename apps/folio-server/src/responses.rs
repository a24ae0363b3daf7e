use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use folio_policy::Decision;
use serde_json::{json, Value};

/// Problem-JSON body (`type`/`title`/`status`/`detail`).
pub(crate) fn problem(status: StatusCode, title: &str, detail: impl Into<String>) -> Response {
    problem_with(status, title, detail, Value::Null)
}

/// Like [`problem`], with extra members merged into the body.
pub(crate) fn problem_with(
    status: StatusCode,
    title: &str,
    detail: impl Into<String>,
    extra: Value,
) -> Response {
    let mut body = json!({
        "type": "about:blank",
        "title": title,
        "status": status.as_u16(),
        "detail": detail.into(),
    });
    if let (Value::Object(dst), Value::Object(src)) = (&mut body, extra) {
        for (k, v) in src {
            dst.entry(k).or_insert(v);
        }
    }
    (status, Json(body)).into_response()
}

pub(crate) fn forbidden(decision: &Decision) -> Response {
    let explain = decision.explain();
    let detail = explain["message"]
        .as_str()
        .unwrap_or("access denied")
        .to_string();
    problem_with(
        StatusCode::FORBIDDEN,
        "Forbidden",
        detail,
        json!({ "decision": explain }),
    )
}

pub(crate) fn bad_request(detail: impl Into<String>) -> Response {
    problem(StatusCode::BAD_REQUEST, "Bad Request", detail)
}

pub(crate) fn not_found(detail: impl Into<String>) -> Response {
    problem(StatusCode::NOT_FOUND, "Not Found", detail)
}

pub(crate) fn internal(err: &dyn std::fmt::Display) -> Response {
    tracing::error!(target: "folio::http", error = %err, "request failed");
    problem(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error",
        err.to_string(),
    )
}

pub(crate) fn unavailable(detail: impl Into<String>) -> Response {
    problem(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable", detail)
}
