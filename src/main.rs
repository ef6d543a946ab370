#![forbid(unsafe_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use poem::listener::TcpListener;

// Wiki Utilities
use crate::handlers::{build_routes, WikiState};
use crate::utils::config::{describe_locations, init_log, init_runtime_context, RuntimeCtx, WIKI_ARGS, WIKI_DIRS};
use crate::utils::errors::Errors;
use crate::wiki::page_store::{PageStore, PageTitle};
use crate::wiki::templates::Templates;

// Modules
mod handlers;
mod utils;
mod wiki;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "WikiServer"; // for poem logging

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<()> {
    // --------------- Initialize Wiki ----------------
    // Announce ourselves.
    println!("Starting wiki_server!");

    // Only lay down the data directories if that's all that was asked for.
    if WIKI_ARGS.create_dirs_only {
        lazy_static::initialize(&WIKI_DIRS);
        println!("Wiki directories created under {}.", WIKI_DIRS.root_dir);
        return Ok(());
    }

    // Initialize the server.  Configuration and template problems are fatal.
    let runtime_ctx = wiki_init()?;
    let state = init_wiki_state(&runtime_ctx)?;

    // --------------- Main Loop Set Up ---------------
    // Assign the base URL advertised in the openapi document.
    let config = &runtime_ctx.parms.config;
    let api_url = format!("{}:{}{}", config.http_addr, config.http_port, "/api");
    let app = build_routes(Arc::new(state), &api_url);

    // ------------------ Main Loop -------------------
    let addr = format!("{}{}", "0.0.0.0:", config.http_port);
    info!("{} listening on {}.", config.title, addr);
    let result = poem::Server::new(TcpListener::bind(addr.clone()))
        .name(SERVER_NAME)
        .run(app)
        .await;

    // Failing to bind is the one runtime error that ends the process.
    if let Err(e) = result {
        error!("Unable to serve on {}: {}", addr, e);
        std::process::exit(1);
    }
    Ok(())
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// wiki_init:
// ---------------------------------------------------------------------------
/** Initialize logging and read the runtime parameters. */
fn wiki_init() -> Result<RuntimeCtx> {
    // Configure our log.
    init_log();

    let runtime_ctx = init_runtime_context()?;
    info!("{}", Errors::InputParms(format!("{:#?}", runtime_ctx)));
    info!("Wiki file locations:\n  {}", describe_locations(&runtime_ctx.parms, runtime_ctx.wiki_dirs));

    // Log build info.
    print_version_info();

    Ok(runtime_ctx)
}

// ---------------------------------------------------------------------------
// init_wiki_state:
// ---------------------------------------------------------------------------
/** Seed any missing templates, parse the templates, and package them with
 * the page store for injection into the routes.
 */
fn init_wiki_state(runtime_ctx: &RuntimeCtx) -> Result<WikiState> {
    let templates_dir = Path::new(&runtime_ctx.wiki_dirs.templates_dir);
    Templates::install_defaults(templates_dir)?;
    let templates = match Templates::load(templates_dir) {
        Ok(t) => t,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let front_page = PageTitle::parse(&runtime_ctx.parms.config.front_page)?;
    let store = PageStore::new(&runtime_ctx.wiki_dirs.pages_dir);
    info!("Serving pages from {}.", store.pages_dir().display());

    Ok(WikiState::new(store, templates, front_page))
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    // Log build info.
    info!("{}.", format!("\n*** Running WIKI={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}",
                        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
                        env!("GIT_BRANCH"),
                        env!("GIT_COMMIT_SHORT"),
                        env!("GIT_DIRTY"),
                        env!("SOURCE_TIMESTAMP"),
                        env!("RUSTC_VERSION")),
    );
}
