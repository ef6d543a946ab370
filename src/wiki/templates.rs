#![forbid(unsafe_code)]

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use tera::{Context, Tera};

use crate::utils::errors::Errors;
use crate::wiki::page_store::Page;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Built-in templates written to the templates directory when missing.
const DEFAULT_VIEW_TEMPLATE : &str = include_str!("../../templates/show.html");
const DEFAULT_EDIT_TEMPLATE : &str = include_str!("../../templates/edit.html");

// ***************************************************************************
//                                Enums
// ***************************************************************************
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateName {
    View,
    Edit,
}

impl TemplateName {
    pub const ALL: [TemplateName; 2] = [TemplateName::View, TemplateName::Edit];

    /// The file name is also the name the template is registered under.
    pub fn file_name(&self) -> &'static str {
        match self {
            TemplateName::View => "show.html",
            TemplateName::Edit => "edit.html",
        }
    }

    fn default_source(&self) -> &'static str {
        match self {
            TemplateName::View => DEFAULT_VIEW_TEMPLATE,
            TemplateName::Edit => DEFAULT_EDIT_TEMPLATE,
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TemplateName::View => write!(f, "view"),
            TemplateName::Edit => write!(f, "edit"),
        }
    }
}

// ***************************************************************************
//                                Templates
// ***************************************************************************
/** The parsed view and edit templates.  Built once at startup and read-only
 * afterwards.
 */
#[derive(Debug)]
pub struct Templates {
    tera: Tera,
}

impl Templates {
    // ------------------------------------------------------------------------
    // load:
    // ------------------------------------------------------------------------
    /** Read and parse show.html and edit.html from the templates directory. */
    pub fn load(templates_dir: &Path) -> Result<Templates, Errors> {
        let mut sources = vec!();
        for name in TemplateName::ALL {
            let path = templates_dir.join(name.file_name());
            let source = fs::read_to_string(&path)
                .map_err(|e| Errors::TemplateLoad(path.display().to_string(), e.to_string()))?;
            sources.push((name.file_name(), source));
        }
        Self::build(sources)
    }

    // ------------------------------------------------------------------------
    // from_sources:
    // ------------------------------------------------------------------------
    #[cfg(test)]
    pub fn from_sources(view: &str, edit: &str) -> Result<Templates, Errors> {
        Self::build(vec![(TemplateName::View.file_name(), view.to_string()),
                         (TemplateName::Edit.file_name(), edit.to_string())])
    }

    // ------------------------------------------------------------------------
    // install_defaults:
    // ------------------------------------------------------------------------
    /** Write the built-in template for each template file missing from the
     * directory.  Existing files are left alone.  Returns the paths written.
     */
    pub fn install_defaults(templates_dir: &Path) -> Result<Vec<PathBuf>, Errors> {
        let mut written = vec!();
        for name in TemplateName::ALL {
            let path = templates_dir.join(name.file_name());
            if path.exists() {
                continue;
            }
            fs::write(&path, name.default_source())?;
            info!("Installed default {} template at {}.", name, path.display());
            written.push(path);
        }
        Ok(written)
    }

    // ------------------------------------------------------------------------
    // render:
    // ------------------------------------------------------------------------
    /** Render the named template with the page's title and body.  The .html
     * templates are autoescaped by tera.
     */
    pub fn render(&self, name: TemplateName, page: &Page) -> Result<String, Errors> {
        let mut context = Context::new();
        context.insert("title", page.title.as_str());
        context.insert("body", &page.body_text());
        self.tera.render(name.file_name(), &context)
            .map_err(|e| Errors::TemplateRender(name.file_name().to_string(), error_chain(&e)))
    }

    fn build(sources: Vec<(&str, String)>) -> Result<Templates, Errors> {
        let mut tera = Tera::default();
        if let Err(e) = tera.add_raw_templates(sources) {
            return Err(Errors::TemplateLoad("templates".to_string(), error_chain(&e)));
        }
        Ok(Templates { tera })
    }
}

// ---------------------------------------------------------------------------
// error_chain:
// ---------------------------------------------------------------------------
// Tera puts the useful part of its messages in the error sources.
fn error_chain(e: &tera::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg += ": ";
        msg += &s.to_string();
        source = s.source();
    }
    msg
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::page_store::PageTitle;

    fn page(title: &str, body: &str) -> Page {
        Page::new(PageTitle::parse(title).unwrap(), body.as_bytes().to_vec())
    }

    #[test]
    fn default_templates_render() {
        let templates = Templates::from_sources(DEFAULT_VIEW_TEMPLATE, DEFAULT_EDIT_TEMPLATE).unwrap();

        let html = templates.render(TemplateName::View, &page("hello", "Hello World")).unwrap();
        assert!(html.contains("<h1>hello</h1>"));
        assert!(html.contains("Hello World"));

        let html = templates.render(TemplateName::Edit, &page("hello", "Hello World")).unwrap();
        assert!(html.contains(r#"action="/save/hello""#));
        assert!(html.contains(r#"name="content""#));
        assert!(html.contains("Hello World"));
    }

    #[test]
    fn body_is_escaped() {
        let templates = Templates::from_sources(DEFAULT_VIEW_TEMPLATE, DEFAULT_EDIT_TEMPLATE).unwrap();
        let html = templates.render(TemplateName::View, &page("xss", "<script>alert(1)</script>")).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn bad_template_syntax_fails_to_load() {
        let result = Templates::from_sources("{{ title", DEFAULT_EDIT_TEMPLATE);
        assert!(matches!(result, Err(Errors::TemplateLoad(_, _))));
    }

    #[test]
    fn undefined_variable_fails_to_render() {
        let templates = Templates::from_sources("{{ author.name }}", DEFAULT_EDIT_TEMPLATE).unwrap();
        match templates.render(TemplateName::View, &page("hello", "")) {
            Err(Errors::TemplateRender(name, msg)) => {
                assert_eq!(name, "show.html");
                assert!(msg.contains("author"), "{}", msg);
            },
            other => panic!("unexpected render result: {:?}", other),
        }
    }

    #[test]
    fn install_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let edit_path = dir.path().join("edit.html");
        fs::write(&edit_path, "custom {{ title }}").unwrap();

        let written = Templates::install_defaults(dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("show.html")]);
        assert_eq!(fs::read_to_string(&edit_path).unwrap(), "custom {{ title }}");

        let templates = Templates::load(dir.path()).unwrap();
        let html = templates.render(TemplateName::Edit, &page("mine", "")).unwrap();
        assert_eq!(html, "custom mine");

        assert!(Templates::install_defaults(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn load_missing_templates_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Templates::load(dir.path()), Err(Errors::TemplateLoad(_, _))));
    }
}
