use clap::Args;
use efiling_core::config::AppConfig;
use efiling_core::routing::SlaCalculator;
use efiling_db::{DbPool, SqlSlaRuleRepository};
use serde::Serialize;

use crate::commands::{classify, with_database, CommandFailure, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct SlaArgs {
    #[arg(long = "from", help = "Role code of the sender")]
    pub from_role: String,
    #[arg(long = "to", help = "Role code of the recipient")]
    pub to_role: String,
}

#[derive(Debug, Serialize)]
struct SlaOutput {
    from_role: String,
    to_role: String,
    sla_hours: u32,
}

pub fn run(args: SlaArgs) -> CommandResult {
    match with_database("sla", |config, pool| lookup(config, pool, args)) {
        Ok(output) => CommandResult::success_with_data(
            "sla",
            format!("{} -> {}: {}h", output.from_role, output.to_role, output.sla_hours),
            &output,
        ),
        Err(failure) => failure,
    }
}

async fn lookup(config: AppConfig, pool: DbPool, args: SlaArgs) -> Result<SlaOutput, CommandFailure> {
    let calculator = SlaCalculator::new(SqlSlaRuleRepository::new(pool))
        .with_default_hours(config.routing.default_sla_hours);

    let sla_hours =
        calculator.get_sla(&args.from_role, &args.to_role).await.map_err(classify)?;
    Ok(SlaOutput { from_role: args.from_role, to_role: args.to_role, sla_hours })
}
