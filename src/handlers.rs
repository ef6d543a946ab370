#![forbid(unsafe_code)]

use std::sync::Arc;

use log::error;
use poem::http::{header, StatusCode};
use poem::web::Html;
use poem::{get, post, Endpoint, EndpointExt, IntoResponse, Response, Route};
use poem_openapi::OpenApiService;

use crate::wiki::page_store::{Page, PageStore, PageTitle};
use crate::wiki::templates::{TemplateName, Templates};

pub mod edit;
pub mod front_page;
pub mod save;
pub mod show;
pub mod version;

// From cargo.toml.
const WIKI_VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

// ***************************************************************************
//                                WikiState
// ***************************************************************************
/** Everything the handlers share.  Built once in main and attached to the
 * route tree as request data; never mutated.
 */
#[derive(Debug)]
pub struct WikiState {
    pub store: PageStore,
    pub templates: Templates,
    pub front_page: PageTitle,
}

impl WikiState {
    pub fn new(store: PageStore, templates: Templates, front_page: PageTitle) -> Self {
        WikiState { store, templates, front_page }
    }
}

// ***************************************************************************
//                                 Routes
// ***************************************************************************
// ---------------------------------------------------------------------------
// build_routes:
// ---------------------------------------------------------------------------
/** The page routes capture the whole path remainder as the title, so titles
 * containing '/' reach the handlers and are rejected there.
 */
pub fn build_routes(state: Arc<WikiState>, api_url: &str) -> impl Endpoint<Output = Response> {
    let api_service =
        OpenApiService::new(version::VersionApi, "Wiki Server", WIKI_VERSION.unwrap_or("unknown"))
        .server(api_url.to_string());
    let spec = api_service.spec_endpoint();

    Route::new()
        .at("/", get(front_page::front_page))
        .at("/show/*title", get(show::show_page))
        .at("/edit/*title", get(edit::edit_page))
        .at("/save/*title", post(save::save_page))
        .nest("/api", api_service)
        .at("/api/spec", spec)
        .data(state)
}

// ***************************************************************************
//                            Response Helpers
// ***************************************************************************
fn make_http_200(html: String) -> Response {
    Html(html).into_response()
}
fn make_http_302(location: String) -> Response {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .finish()
}
fn make_http_400(msg: String) -> Response {
    make_text_response(StatusCode::BAD_REQUEST, msg)
}
fn make_http_500(msg: String) -> Response {
    make_text_response(StatusCode::INTERNAL_SERVER_ERROR, msg)
}
fn make_text_response(status: StatusCode, msg: String) -> Response {
    Response::builder()
        .status(status)
        .content_type("text/plain; charset=utf-8")
        .body(msg)
}

// ---------------------------------------------------------------------------
// parse_title:
// ---------------------------------------------------------------------------
/** Validate the raw path remainder, returning a ready 400 response on failure. */
fn parse_title(raw: &str) -> Result<PageTitle, Response> {
    PageTitle::parse(raw).map_err(|e| {
        error!("{}", e);
        make_http_400(e.to_string())
    })
}

// ---------------------------------------------------------------------------
// render_page:
// ---------------------------------------------------------------------------
/** Render failures go back to the client verbatim as a 500. */
fn render_page(templates: &Templates, name: TemplateName, page: &Page) -> Response {
    match templates.render(name, page) {
        Ok(html) => make_http_200(html),
        Err(e) => {
            let msg = e.to_string();
            error!("{}", msg);
            make_http_500(msg)
        }
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use poem::endpoint::BoxEndpoint;
    use poem::test::{TestClient, TestForm, TestResponse};
    use tempfile::TempDir;

    struct TestWiki {
        dir: TempDir,
        client: TestClient<BoxEndpoint<'static, Response>>,
    }

    impl TestWiki {
        fn pages_dir(&self) -> std::path::PathBuf {
            self.dir.path().join("pages")
        }
    }

    fn default_templates(dir: &Path) -> Templates {
        let templates_dir = dir.join("templates");
        fs::create_dir(&templates_dir).unwrap();
        Templates::install_defaults(&templates_dir).unwrap();
        Templates::load(&templates_dir).unwrap()
    }

    fn test_wiki_with(templates: impl FnOnce(&Path) -> Templates, create_pages_dir: bool) -> TestWiki {
        let dir = tempfile::tempdir().unwrap();
        let pages_dir = dir.path().join("pages");
        if create_pages_dir {
            fs::create_dir(&pages_dir).unwrap();
        }
        let state = WikiState::new(PageStore::new(&pages_dir),
                                   templates(dir.path()),
                                   PageTitle::parse("Home").unwrap());
        let app = build_routes(Arc::new(state), "http://localhost:8080/api").boxed();
        TestWiki { dir, client: TestClient::new(app) }
    }

    fn test_wiki() -> TestWiki {
        test_wiki_with(default_templates, true)
    }

    async fn body_text(resp: TestResponse) -> String {
        resp.0.into_body().into_string().await.unwrap()
    }

    #[tokio::test]
    async fn save_then_show() {
        let wiki = test_wiki();

        let resp = wiki.client.post("/save/hello").form(&[("content", "Hello World")]).send().await;
        resp.assert_status(StatusCode::FOUND);
        resp.assert_header(header::LOCATION, "/show/hello");
        assert_eq!(fs::read(wiki.pages_dir().join("hello.txt")).unwrap(), b"Hello World");

        let resp = wiki.client.get("/show/hello").send().await;
        resp.assert_status_is_ok();
        let html = body_text(resp).await;
        assert!(html.contains("Hello World"));
        assert!(html.contains("<h1>hello</h1>"));
    }

    #[tokio::test]
    async fn show_missing_redirects_to_edit() {
        let wiki = test_wiki();
        let resp = wiki.client.get("/show/missing").send().await;
        resp.assert_status(StatusCode::FOUND);
        resp.assert_header(header::LOCATION, "/edit/missing");
    }

    #[tokio::test]
    async fn edit_missing_renders_empty_form() {
        let wiki = test_wiki();
        let resp = wiki.client.get("/edit/missing").send().await;
        resp.assert_status_is_ok();
        let html = body_text(resp).await;
        assert!(html.contains(r#"action="/save/missing""#));
        assert!(html.contains(r#"cols="80"></textarea>"#));
        assert!(!wiki.pages_dir().join("missing.txt").exists());
    }

    #[tokio::test]
    async fn edit_existing_prefills_form() {
        let wiki = test_wiki();
        fs::write(wiki.pages_dir().join("notes.txt"), "remember the milk").unwrap();
        let resp = wiki.client.get("/edit/notes").send().await;
        resp.assert_status_is_ok();
        assert!(body_text(resp).await.contains(r#"cols="80">remember the milk</textarea>"#));
    }

    #[tokio::test]
    async fn save_is_idempotent() {
        let wiki = test_wiki();
        for _ in 0..2 {
            let resp = wiki.client.post("/save/twice").form(&[("content", "same text")]).send().await;
            resp.assert_status(StatusCode::FOUND);
            assert_eq!(fs::read_to_string(wiki.pages_dir().join("twice.txt")).unwrap(), "same text");
        }
    }

    #[tokio::test]
    async fn save_without_content_stores_empty_page() {
        let wiki = test_wiki();
        let resp = wiki.client.post("/save/blank").form(&[("other", "ignored")]).send().await;
        resp.assert_status(StatusCode::FOUND);
        assert_eq!(fs::read(wiki.pages_dir().join("blank.txt")).unwrap(), b"");
    }

    #[tokio::test]
    async fn save_without_body_stores_empty_page() {
        let wiki = test_wiki();
        fs::write(wiki.pages_dir().join("nobody.txt"), "old text").unwrap();
        let resp = wiki.client.post("/save/nobody").send().await;
        resp.assert_status(StatusCode::FOUND);
        resp.assert_header(header::LOCATION, "/show/nobody");
        assert_eq!(fs::read(wiki.pages_dir().join("nobody.txt")).unwrap(), b"");
    }

    #[tokio::test]
    async fn save_multipart_form() {
        let wiki = test_wiki();
        let form = TestForm::new().text("title", "ignored").text("content", "hi");
        let resp = wiki.client.post("/save/multi").multipart(form).send().await;
        resp.assert_status(StatusCode::FOUND);
        resp.assert_header(header::LOCATION, "/show/multi");
        assert_eq!(fs::read(wiki.pages_dir().join("multi.txt")).unwrap(), b"hi");

        let form = TestForm::new().text("other", "x");
        let resp = wiki.client.post("/save/multi").multipart(form).send().await;
        resp.assert_status(StatusCode::FOUND);
        assert_eq!(fs::read(wiki.pages_dir().join("multi.txt")).unwrap(), b"");
    }

    #[tokio::test]
    async fn unsafe_titles_are_rejected() {
        let wiki = test_wiki();
        for uri in ["/show/.hidden", "/edit/a/b", "/show/..%2F..%2Fetc%2Fpasswd"] {
            let resp = wiki.client.get(uri).send().await;
            resp.assert_status(StatusCode::BAD_REQUEST);
        }

        let resp = wiki.client.post("/save/..%2Fescaped").form(&[("content", "x")]).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(!wiki.dir.path().join("escaped.txt").exists());
        assert_eq!(fs::read_dir(wiki.pages_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn render_failure_is_500_with_error_text() {
        let wiki = test_wiki_with(
            |_| Templates::from_sources("{{ author }}", "{{ title }}").unwrap(), true);
        fs::write(wiki.pages_dir().join("broken.txt"), "body").unwrap();

        let resp = wiki.client.get("/show/broken").send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(resp).await.contains("author"));

        // The edit template is fine.
        let resp = wiki.client.get("/edit/broken").send().await;
        resp.assert_status_is_ok();
        resp.assert_text("broken").await;
    }

    #[tokio::test]
    async fn save_failure_is_500() {
        let wiki = test_wiki_with(default_templates, false);
        let resp = wiki.client.post("/save/lost").form(&[("content", "x")]).send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(resp).await.contains("lost"));
    }

    #[tokio::test]
    async fn root_redirects_to_front_page() {
        let wiki = test_wiki();
        let resp = wiki.client.get("/").send().await;
        resp.assert_status(StatusCode::FOUND);
        resp.assert_header(header::LOCATION, "/show/Home");
    }

    #[tokio::test]
    async fn show_rejects_post() {
        let wiki = test_wiki();
        let resp = wiki.client.post("/show/hello").send().await;
        resp.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn version_and_spec() {
        let wiki = test_wiki();
        let resp = wiki.client.get("/api/version").send().await;
        resp.assert_status_is_ok();
        let json = body_text(resp).await;
        assert!(json.contains(&format!("\"version\":\"{}\"", env!("CARGO_PKG_VERSION"))));

        let resp = wiki.client.get("/api/spec").send().await;
        resp.assert_status_is_ok();
        assert!(body_text(resp).await.contains("/version"));
    }
}
