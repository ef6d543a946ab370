#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::web::{Data, Path};
use poem::{handler, Request, Response};

use crate::handlers::{make_http_302, parse_title, render_page, WikiState};
use crate::utils::wiki_utils::{debug_request, RequestDebug};
use crate::wiki::templates::TemplateName;

// ***************************************************************************
//                          Request Definitions
// ***************************************************************************
struct ReqShowPage
{
    title: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqShowPage {
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request path:");
        s.push_str("\n    title: ");
        s.push_str(&self.title);
        s
    }
}

// ***************************************************************************
//                                Endpoint
// ***************************************************************************
// ---------------------------------------------------------------------------
// show_page:
// ---------------------------------------------------------------------------
/** GET /show/<title>.  A page that cannot be loaded is treated as one that
 * does not exist yet, so the client is sent to its edit form.
 */
#[handler]
pub fn show_page(http_req: &Request, Path(title): Path<String>, state: Data<&Arc<WikiState>>) -> Response {
    let req = ReqShowPage { title };
    debug_request(http_req, &req);

    let title = match parse_title(&req.title) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match state.store.load(&title) {
        Ok(page) => render_page(&state.templates, TemplateName::View, &page),
        Err(_) => make_http_302(format!("/edit/{}", title)),
    }
}
