use clap::Args;
use efiling_core::auth::StaticTokenAuthenticator;
use efiling_core::config::AppConfig;
use efiling_core::domain::file::EfilingFile;
use efiling_core::geography::{GeographyFilterBuilder, ScopeRequest, ScopeResolution};
use efiling_db::{DbPool, SqlFileRepository, SqlGeographyDirectory};
use secrecy::SecretString;
use serde::Serialize;

use crate::commands::{classify, with_database, CommandFailure, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct FilesArgs {
    #[arg(long, help = "Restrict the listing to the caller's jurisdiction")]
    pub scoped: bool,
    #[arg(long, help = "Service token identifying the caller (see auth.service_tokens)")]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
struct FilesOutput {
    scoped_to: Option<i64>,
    files: Vec<EfilingFile>,
}

pub fn run(args: FilesArgs) -> CommandResult {
    match with_database("files", |config, pool| list(config, pool, args)) {
        Ok(output) => {
            let message = match output.scoped_to {
                Some(user_id) => format!("{} file(s) visible to user {user_id}", output.files.len()),
                None => format!("{} file(s), unscoped", output.files.len()),
            };
            CommandResult::success_with_data("files", message, &output)
        }
        Err(failure) => failure,
    }
}

async fn list(config: AppConfig, pool: DbPool, args: FilesArgs) -> Result<FilesOutput, CommandFailure> {
    let builder = GeographyFilterBuilder::new(
        StaticTokenAuthenticator::from_config(&config.auth),
        SqlGeographyDirectory::new(pool.clone()),
    );
    let request = ScopeRequest {
        apply_geography: args.scoped,
        credential: args.token.map(SecretString::from),
    };

    let resolution = builder.resolve_scope(&request).await.map_err(classify)?;
    let scoped_to = match &resolution {
        ScopeResolution::Unscoped => None,
        ScopeResolution::Scoped { caller, .. } => Some(caller.user_id.0),
    };

    let files = SqlFileRepository::new(pool)
        .list_visible(&resolution.filter())
        .await
        .map_err(|error| classify(error.into()))?;

    Ok(FilesOutput { scoped_to, files })
}
