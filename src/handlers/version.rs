#![forbid(unsafe_code)]

use poem_openapi::{ OpenApi, payload::Json, Object };

// From cargo.toml.
const WIKI_VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct VersionApi;

#[derive(Object)]
struct RespVersion
{
    version: String,
    git_branch: String,
    git_commit: String,
    git_dirty: String,
    source_ts: String,
    rustc_version: String,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl VersionApi {
    #[oai(path = "/version", method = "get")]
    async fn get_version(&self) -> Json<RespVersion> {
        Json(RespVersion::process())
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespVersion {
    fn new(version: &str, branch: &str, commit: &str, dirty: &str, ts: &str, rustc: &str)
    -> Self {
        Self {version: version.to_string(),
              git_branch: branch.to_string(),
              git_commit: commit.to_string(),
              git_dirty:  dirty.to_string(),
              source_ts: ts.to_string(),
              rustc_version: rustc.to_string(),
        }
    }

    // The build script always exports the git and rustc values.
    fn process() -> RespVersion {
        Self::new(WIKI_VERSION.unwrap_or("unknown"),
                  env!("GIT_BRANCH"),
                  env!("GIT_COMMIT_SHORT"),
                  env!("GIT_DIRTY"),
                  env!("SOURCE_TIMESTAMP"),
                  env!("RUSTC_VERSION"))
    }
}
