#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::web::Data;
use poem::{handler, Response};

use crate::handlers::{make_http_302, WikiState};

// ---------------------------------------------------------------------------
// front_page:
// ---------------------------------------------------------------------------
// GET / redirects to the configured front page.
#[handler]
pub fn front_page(state: Data<&Arc<WikiState>>) -> Response {
    make_http_302(format!("/show/{}", state.front_page))
}
