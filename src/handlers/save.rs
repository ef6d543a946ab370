#![forbid(unsafe_code)]

use std::sync::Arc;

use log::{error, info};
use poem::error::BadRequest;
use poem::web::{Data, Form, Multipart, Path};
use poem::{handler, FromRequest, Request, RequestBody, Response};
use serde::Deserialize;

use crate::handlers::{make_http_302, make_http_500, parse_title, WikiState};
use crate::utils::wiki_utils::{debug_request, RequestDebug};
use crate::wiki::page_store::Page;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const CONTENT_FIELD    : &str = "content";
const FORM_URLENCODED  : &str = "application/x-www-form-urlencoded";
const FORM_MULTIPART   : &str = "multipart/form-data";

// ***************************************************************************
//                          Request Definitions
// ***************************************************************************
#[derive(Deserialize)]
struct SaveForm
{
    // An absent field saves an empty page.
    #[serde(default)]
    content: String,
}

/** The "content" field of a save request.  Url-encoded and multipart bodies
 * are both read; any other body, or none at all, yields empty content.
 */
pub struct SaveContent(String);

impl<'a> FromRequest<'a> for SaveContent {
    async fn from_request(req: &'a Request, body: &mut RequestBody) -> poem::Result<Self> {
        let content_type = req.content_type().unwrap_or_default().to_ascii_lowercase();

        if content_type.starts_with(FORM_URLENCODED) {
            let Form(form) = Form::<SaveForm>::from_request(req, body).await?;
            return Ok(SaveContent(form.content));
        }

        if content_type.starts_with(FORM_MULTIPART) {
            let mut multipart = Multipart::from_request(req, body).await?;
            while let Some(field) = multipart.next_field().await.map_err(BadRequest)? {
                if field.name() == Some(CONTENT_FIELD) {
                    return Ok(SaveContent(field.text().await.map_err(BadRequest)?));
                }
            }
        }

        Ok(SaveContent(String::new()))
    }
}

struct ReqSavePage
{
    title: String,
    content: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqSavePage {
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    title: ");
        s.push_str(&self.title);
        s.push_str("\n    content bytes: ");
        s.push_str(&self.content.len().to_string());
        s
    }
}

// ***************************************************************************
//                                Endpoint
// ***************************************************************************
// ---------------------------------------------------------------------------
// save_page:
// ---------------------------------------------------------------------------
/** POST /save/<title> with form field "content", which may be missing.  Overwrites the page and
 * redirects to its view.  Concurrent saves of one title race; the last
 * write wins.
 */
#[handler]
pub fn save_page(http_req: &Request, Path(title): Path<String>, SaveContent(content): SaveContent,
                 state: Data<&Arc<WikiState>>) -> Response {
    let req = ReqSavePage { title, content };
    debug_request(http_req, &req);

    let title = match parse_title(&req.title) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let page = Page::new(title, req.content.into_bytes());
    match state.store.save(&page) {
        Ok(()) => {
            info!("Saved page '{}' ({} bytes).", page.title, page.body.len());
            make_http_302(format!("/show/{}", page.title))
        },
        Err(e) => {
            let msg = e.to_string();
            error!("{}", msg);
            make_http_500(msg)
        }
    }
}
