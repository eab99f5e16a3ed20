use axum::response::{Html, IntoResponse};

use crate::views;

pub async fn home() -> impl IntoResponse {
    Html(views::home_page())
}
