#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use serde::Deserialize;
use std::{env, fs, path::Path};
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;
use structopt::StructOpt;

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;

// Wiki Utilities
use crate::utils::{wiki_utils::get_absolute_path, errors::Errors};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_WIKI_ROOT_DIR    : &str = "WIKI_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.wiki";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const PAGES_DIR            : &str = "/pages";
const TEMPLATES_DIR        : &str = "/templates";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml"; // relative to config dir
const WIKI_CONFIG_FILE     : &str = "/wiki.toml";  // relative to config dir

// Console logging used when no log4rs.yml is installed.
const DEFAULT_LOG_PATTERN  : &str = "{d} {l} {t} - {m}{n}";
const DEFAULT_LOG_APPENDER : &str = "stdout";

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 8080;

// Page shown when the root URL is requested.
const DEFAULT_FRONT_PAGE   : &str = "FrontPage";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE the runtime context is initialized in main.
lazy_static! {
    pub static ref WIKI_ARGS: WikiArgs = init_wiki_args();
}

// Calculate the data directories BEFORE the runtime context is initialized in main.
lazy_static! {
    pub static ref WIKI_DIRS: WikiDirs = init_wiki_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// WikiDirs:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct WikiDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
    pub pages_dir: String,
    pub templates_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// WikiArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "wiki_args", about = "Command line arguments for Wiki Server.")]
pub struct WikiArgs {
    /// Specify the wiki's root data directory.
    ///
    /// This directory contains the configuration, logs, pages and templates
    /// the server uses during execution.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the WIKI_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root_dir command line argument,
    ///
    ///   3. Otherwise, ~/.wiki
    ///
    #[structopt(short, long)]
    pub create_dirs_only: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub wiki_dirs: &'static WikiDirs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub front_page: String,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Wiki Server".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            front_page: DEFAULT_FRONT_PAGE.to_string(),
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_wiki_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_wiki_args() -> WikiArgs {
    let args = WikiArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_wiki_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories. */
fn init_wiki_dirs() -> WikiDirs {
    // Initialize the mistrust object.
    let mistrust = get_mistrust();

    // Check that each path is absolute and is a directory with the
    // proper permission assign if it exists.  If it doesn't exist,
    // create it.
    let root_dir = get_root_dir();
    check_wiki_dir(&root_dir, "root directory", &mistrust);

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_wiki_dir(&config_dir, "config directory", &mistrust);

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_wiki_dir(&logs_dir, "logs directory", &mistrust);

    let pages_dir = root_dir.clone() + PAGES_DIR;
    check_wiki_dir(&pages_dir, "pages directory", &mistrust);

    let templates_dir = root_dir.clone() + TEMPLATES_DIR;
    check_wiki_dir(&templates_dir, "templates directory", &mistrust);

    // Package up and return the directories.
    WikiDirs {
        root_dir, config_dir, logs_dir, pages_dir, templates_dir,
    }
}

// ---------------------------------------------------------------------------
// check_wiki_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 *
 * Any failure results in a panic.
 */
fn check_wiki_dir(dir: &String, msgname: &str, mistrust: &Mistrust) {
    // Get the path object.
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The wiki {} path must be absolute: {}", msgname, dir);
    }
    if path.exists() {
        // Make sure the path represents a directory.
        if !path.is_dir() {
            panic!("The wiki {} path must be a directory: {}", msgname, dir);
        }

        // Make sure the directory had rwx for owner only.
        let meta = path.metadata().unwrap_or_else(|_| panic!("Unable to read metadata for {}: {}", msgname, dir));
        let perm = meta.permissions().mode();
        if perm & 0o777 != 0o700 {
            panic!("The wiki {} path must be have 0o700 permissions: {}", msgname, dir);
        }
    } else {
        // Create the directory with the correct permissions.
        if let Err(e) = mistrust.make_directory(path) {
            panic!("Make directory error for {:?}: {}", path, &e.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Mistrust {
    match Mistrust::builder()
        .ignore_prefix(get_absolute_path("~"))
        .trust_group(0)
        .build() {
            Ok(m) => m,
            Err(e) => {
                panic!("Mistrust configuration error: {}", &e.to_string());
            }
        }
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_WIKI_ROOT_DIR).unwrap_or_else(
        |_| {
            match WIKI_ARGS.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    // Canonicalize the path.
    get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the config directory's log4rs.yml.  When that file
 * does not exist, fall back to an info level console logger.  A log4rs.yml
 * that exists but cannot be used is fatal.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if !Path::new(&logconfig).exists() {
        if let Err(e) = init_console_log() {
            println!("{}", e);
            panic!("{}", Errors::Log4rsInitialization("<console>".to_string()));
        }
        info!("Log4rs initialized with console defaults, no file at: {}", logconfig);
        return;
    }

    match log4rs::init_file(logconfig.clone(), Default::default()) {
        Ok(_) => (),
        Err(e) => {
            println!("{}", e);
            let s = format!("{}", Errors::Log4rsInitialization(logconfig));
            panic!("{}", s);
        },
    }
    info!("Log4rs initialized using: {}", logconfig);
}

// ---------------------------------------------------------------------------
// init_console_log:
// ---------------------------------------------------------------------------
fn init_console_log() -> Result<()> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();
    let config = log4rs::config::Config::builder()
        .appender(Appender::builder().build(DEFAULT_LOG_APPENDER, Box::new(stdout)))
        .build(Root::builder().appender(DEFAULT_LOG_APPENDER).build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    WIKI_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config directory.  If the file cannot be read, default values are used.
 * A file that exists but does not parse is an error.
 */
fn get_parms() -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = WIKI_DIRS.config_dir.clone() + WIKI_CONFIG_FILE;

    // Read the configuration file.
    let config_file_abs = get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            info!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config_file: String::new(), config: Config::new() });
        }
    };

    let config = parse_config(&contents, &config_file_abs)?;
    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
/** Parse the toml configuration.  Missing keys take their default values. */
pub fn parse_config(contents: &str, config_file: &str) -> Result<Config> {
    match toml::from_str(contents) {
        Ok(c)  => Ok(c),
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file.to_string()), e);
            error!("{}", msg);
            Result::Err(anyhow!(msg))
        }
    }
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// describe_locations:
// ---------------------------------------------------------------------------
/** One line per file location the server uses, for the startup log.  An empty
 * config file name means the defaults are in effect.
 */
pub fn describe_locations(parms: &Parms, dirs: &WikiDirs) -> String {
    let config_file = if parms.config_file.is_empty() {"<defaults>"} else {parms.config_file.as_str()};
    format!("root={}\n  config={}\n  config file={}\n  logs={}\n  pages={}\n  templates={}",
            dirs.root_dir, dirs.config_dir, config_file, dirs.logs_dir, dirs.pages_dir, dirs.templates_dir)
}

// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> Result<RuntimeCtx> {
    let parms = get_parms()?;
    Ok(RuntimeCtx {parms, wiki_dirs: &WIKI_DIRS})
}
