use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Response},
};

use super::xsrf::{cookie_value, XSRF_COOKIE};
use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET / - viewer page; issues the XSRF cookie when protection is enabled
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let page = Html(INDEX_HTML);
    if !state.cfg.server.enable_xsrf_protection || cookie_value(&headers, XSRF_COOKIE).is_some() {
        return page.into_response();
    }
    let token = uuid::Uuid::new_v4().simple().to_string();
    (
        [(
            header::SET_COOKIE,
            format!("{XSRF_COOKIE}={token}; Path=/; SameSite=Strict"),
        )],
        page,
    )
        .into_response()
}
