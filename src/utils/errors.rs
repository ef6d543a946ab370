#![forbid(unsafe_code)]

use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("wiki_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    /// A page title that cannot be used as a file name in the pages directory.
    #[error("Invalid page title: '{}'", .0)]
    InvalidTitle(String),

    /// Any failure to read a page file.
    #[error("Page not found: {}", .0)]
    PageNotFound(String),

    #[error("Unable to save page '{}': {}", .0, .1)]
    PageSave(String, std::io::Error),

    #[error("Unable to load template {}: {}", .0, .1)]
    TemplateLoad(String, String),

    #[error("Unable to render template {}: {}", .0, .1)]
    TemplateRender(String, String),
}
