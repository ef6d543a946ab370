#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::web::{Data, Path};
use poem::{handler, Request, Response};

use crate::handlers::{parse_title, render_page, WikiState};
use crate::utils::wiki_utils::{debug_request, RequestDebug};
use crate::wiki::page_store::Page;
use crate::wiki::templates::TemplateName;

// ***************************************************************************
//                          Request Definitions
// ***************************************************************************
struct ReqEditPage
{
    title: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqEditPage {
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
// edit_page:
// ---------------------------------------------------------------------------
/** GET /edit/<title>.  Load failures are not errors here: the form simply
 * starts out empty.
 */
#[handler]
pub fn edit_page(http_req: &Request, Path(title): Path<String>, state: Data<&Arc<WikiState>>) -> Response {
    let req = ReqEditPage { title };
    debug_request(http_req, &req);

    let title = match parse_title(&req.title) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let page = state.store.load(&title).unwrap_or_else(|_| Page::empty(title));
    render_page(&state.templates, TemplateName::Edit, &page)
}
