use clap::Subcommand;
use efiling_core::domain::workflow::TemplateId;
use efiling_db::{DbPool, SqlWorkflowGraphStore, WorkflowGraphStore};

use crate::commands::{classify, with_database, CommandResult};

#[derive(Debug, Clone, Subcommand)]
pub enum TemplateCommand {
    #[command(about = "Show one template with its ordered stages and active transitions")]
    Show {
        #[arg(help = "Workflow template id")]
        id: i64,
    },
    #[command(about = "List workflow templates")]
    List {
        #[arg(long, help = "Only list active templates")]
        active_only: bool,
    },
}

pub fn run(command: TemplateCommand) -> CommandResult {
    match command {
        TemplateCommand::Show { id } => {
            match with_database("template.show", |_config, pool| async move {
                store(pool).get_template(TemplateId(id)).await.map_err(|error| classify(error.into()))
            }) {
                Ok(detail) => CommandResult::success_with_data(
                    "template.show",
                    format!("template {id} has {} stage(s)", detail.stages.len()),
                    &detail,
                ),
                Err(failure) => failure,
            }
        }
        TemplateCommand::List { active_only } => {
            match with_database("template.list", |_config, pool| async move {
                store(pool).list_templates(active_only).await.map_err(|error| classify(error.into()))
            }) {
                Ok(templates) => CommandResult::success_with_data(
                    "template.list",
                    format!("{} template(s)", templates.len()),
                    &templates,
                ),
                Err(failure) => failure,
            }
        }
    }
}

fn store(pool: DbPool) -> SqlWorkflowGraphStore {
    SqlWorkflowGraphStore::new(pool)
}
