#![forbid(unsafe_code)]

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use log::debug;

use crate::utils::errors::Errors;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Every page lives in <pages_dir>/<title>.txt.
const PAGE_FILE_EXT  : &str = ".txt";
const MAX_TITLE_LEN  : usize = 128;
const PAGE_FILE_MODE : u32 = 0o600;

// ***************************************************************************
//                                PageTitle
// ***************************************************************************
/** A page name that is safe to use as a file name inside the pages directory.
 * Titles are 1 to 128 ASCII letters, digits, '-', '_' or '.', and may not
 * start with '.'.  That rules out path separators, "..", hidden files and
 * anything needing escaping in a redirect location.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTitle(String);

impl PageTitle {
    pub fn parse(title: &str) -> Result<PageTitle, Errors> {
        if title.is_empty() || title.len() > MAX_TITLE_LEN || title.starts_with('.') {
            return Err(Errors::InvalidTitle(title.to_string()));
        }
        let valid = title.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if !valid {
            return Err(Errors::InvalidTitle(title.to_string()));
        }
        Ok(PageTitle(title.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageTitle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ***************************************************************************
//                                   Page
// ***************************************************************************
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: PageTitle,
    pub body: Vec<u8>,
}

impl Page {
    pub fn new(title: PageTitle, body: Vec<u8>) -> Self {
        Page { title, body }
    }

    /// A page that has a title but no content yet.
    pub fn empty(title: PageTitle) -> Self {
        Page { title, body: vec!() }
    }

    /// The body as text for rendering; invalid UTF-8 is replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ***************************************************************************
//                                PageStore
// ***************************************************************************
#[derive(Debug, Clone)]
pub struct PageStore {
    pages_dir: PathBuf,
}

impl PageStore {
    pub fn new(pages_dir: impl Into<PathBuf>) -> Self {
        PageStore { pages_dir: pages_dir.into() }
    }

    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    // ------------------------------------------------------------------------
    // page_path:
    // ------------------------------------------------------------------------
    pub fn page_path(&self, title: &PageTitle) -> PathBuf {
        self.pages_dir.join(title.as_str().to_owned() + PAGE_FILE_EXT)
    }

    // ------------------------------------------------------------------------
    // load:
    // ------------------------------------------------------------------------
    /** Read a page from disk.  Every read failure is reported as PageNotFound;
     * the underlying cause only goes to the debug log.
     */
    pub fn load(&self, title: &PageTitle) -> Result<Page, Errors> {
        let path = self.page_path(title);
        match fs::read(&path) {
            Ok(body) => Ok(Page::new(title.clone(), body)),
            Err(e) => {
                debug!("Unable to read page file {:?}: {}", path, e);
                Err(Errors::PageNotFound(title.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------------
    // save:
    // ------------------------------------------------------------------------
    /** Create or overwrite the page file with the page body.  New files are
     * created with owner-only read/write permission.  The write is not atomic.
     */
    pub fn save(&self, page: &Page) -> Result<(), Errors> {
        let path = self.page_path(&page.title);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(PAGE_FILE_MODE)
            .open(&path)
            .map_err(|e| Errors::PageSave(page.title.to_string(), e))?;
        file.write_all(&page.body)
            .map_err(|e| Errors::PageSave(page.title.to_string(), e))?;
        Ok(())
    }
}
