use clap::Args;
use efiling_core::config::AppConfig;
use efiling_core::domain::geography::{DepartmentId, FileLocation, UserId};
use efiling_core::domain::sla::RoutingDecision;
use efiling_core::routing::RoutingResolver;
use efiling_db::{DbPool, SqlGeographyDirectory, SqlSlaRuleRepository};

use crate::commands::{classify, with_database, CommandFailure, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct RouteArgs {
    #[arg(long, help = "E-filing user id of the sender")]
    pub sender: i64,
    #[arg(long, help = "Department the file belongs to (defaults to the sender's)")]
    pub department: Option<i64>,
    #[arg(long, help = "Division of the file (defaults to the sender's)")]
    pub division: Option<i64>,
    #[arg(long, help = "District of the file (defaults to the sender's)")]
    pub district: Option<i64>,
    #[arg(long, help = "Town of the file (defaults to the sender's)")]
    pub town: Option<i64>,
}

impl RouteArgs {
    fn location(&self) -> FileLocation {
        FileLocation {
            department_id: self.department.map(DepartmentId),
            district_id: self.district,
            town_id: self.town,
            division_id: self.division,
        }
    }
}

pub fn run(args: RouteArgs) -> CommandResult {
    let sender = args.sender;
    match with_database("route", |config, pool| resolve(config, pool, args)) {
        Ok(decisions) => CommandResult::success_with_data(
            "route",
            format!("resolved {} recipient(s) for sender {sender}", decisions.len()),
            &decisions,
        ),
        Err(failure) => failure,
    }
}

async fn resolve(
    config: AppConfig,
    pool: DbPool,
    args: RouteArgs,
) -> Result<Vec<RoutingDecision>, CommandFailure> {
    let resolver = RoutingResolver::new(
        SqlGeographyDirectory::new(pool.clone()),
        SqlSlaRuleRepository::new(pool),
        config.routing.global_roles(),
    );

    resolver.resolve(UserId(args.sender), &args.location()).await.map_err(classify)
}

#[cfg(test)]
mod tests {
    use efiling_core::domain::geography::DepartmentId;

    use super::RouteArgs;

    #[test]
    fn unset_flags_leave_location_fields_for_sender_fallback() {
        let args =
            RouteArgs { sender: 2, department: Some(3), division: None, district: Some(4), town: None };

        let location = args.location();

        assert_eq!(location.department_id, Some(DepartmentId(3)));
        assert_eq!(location.district_id, Some(4));
        assert_eq!(location.division_id, None);
        assert_eq!(location.town_id, None);
    }
}
