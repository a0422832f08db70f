//! services/api/src/bin/openapi.rs
//!
//! Dumps the SkillDeck OpenAPI document to disk, for clients that want
//! the schema without running the server. The output path may be given
//! as the first argument and defaults to `openapi.json`.

use api_lib::web::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, spec_json)?;
    println!("OpenAPI document written to {path}");
    Ok(())
}
