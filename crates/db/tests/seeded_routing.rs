use chrono::{TimeZone, Utc};
use efiling_core::domain::geography::{FileLocation, ScopeLevel, UserId};
use efiling_core::domain::sla::{RoutingDecision, RoutingReason};
use efiling_core::domain::workflow::StageId;
use efiling_core::geography::{GeographyDirectory, GeographyFilter};
use efiling_core::routing::{GlobalRoleSet, RoutingResolver, SlaCalculator};
use efiling_db::{
    connect_with_settings, migrations, DbPool, DemoSeedDataset, SqlFileRepository,
    SqlGeographyDirectory, SqlSlaRuleRepository, SqlWorkflowGraphStore, WorkflowGraphStore,
};

async fn seeded_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    DemoSeedDataset::load(&pool).await.expect("load demo seed");
    pool
}

fn resolver(pool: &DbPool) -> RoutingResolver<SqlGeographyDirectory, SqlSlaRuleRepository> {
    RoutingResolver::new(
        SqlGeographyDirectory::new(pool.clone()),
        SqlSlaRuleRepository::new(pool.clone()),
        GlobalRoleSet::new(["ADMIN", "CEO"]),
    )
}

fn recipients(decisions: &[RoutingDecision]) -> Vec<i64> {
    decisions.iter().map(|decision| decision.recipient_id.0).collect()
}

#[tokio::test]
async fn assistant_engineer_routes_to_district_executive_engineer() {
    let pool = seeded_pool().await;

    let decisions =
        resolver(&pool).resolve(UserId(2), &FileLocation::default()).await.expect("resolve");

    assert_eq!(recipients(&decisions), vec![3]);
    assert_eq!(decisions[0].matched_scope, ScopeLevel::District);
    assert_eq!(decisions[0].reason, RoutingReason::SlaRule);
}

#[tokio::test]
async fn explicit_file_district_overrides_sender_district() {
    let pool = seeded_pool().await;
    let location = FileLocation { district_id: Some(4), ..FileLocation::default() };

    let decisions = resolver(&pool).resolve(UserId(2), &location).await.expect("resolve");

    assert_eq!(recipients(&decisions), vec![4]);
}

#[tokio::test]
async fn division_rule_reaches_superintending_engineer() {
    let pool = seeded_pool().await;

    let decisions =
        resolver(&pool).resolve(UserId(3), &FileLocation::default()).await.expect("resolve");

    assert_eq!(recipients(&decisions), vec![5]);
    assert_eq!(decisions[0].matched_scope, ScopeLevel::Division);
}

#[tokio::test]
async fn global_role_sender_reaches_every_other_active_user() {
    let pool = seeded_pool().await;
    let location = FileLocation { district_id: Some(99), ..FileLocation::default() };

    let decisions = resolver(&pool).resolve(UserId(1), &location).await.expect("resolve");

    assert_eq!(recipients(&decisions), vec![2, 3, 4, 5]);
    assert!(decisions.iter().all(|decision| decision.reason == RoutingReason::GlobalRole
        && decision.matched_scope == ScopeLevel::Global));
}

#[tokio::test]
async fn seeded_matrix_drives_sla_and_deadline() {
    let pool = seeded_pool().await;
    let calculator = SlaCalculator::new(SqlSlaRuleRepository::new(pool));
    let assigned_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("valid instant");

    assert_eq!(calculator.get_sla("WAT_AEN", "WAT_XEN").await.expect("sla"), 48);
    assert_eq!(calculator.get_sla("XEN", "SE").await.expect("sla"), 24);
    assert_eq!(
        calculator.deadline("WAT_XEN", "WAT_SE", assigned_at).await.expect("deadline"),
        Utc.with_ymd_and_hms(2026, 3, 5, 9, 0, 0).single().expect("valid instant")
    );
}

#[tokio::test]
async fn zone_scoped_officer_sees_only_zone_files() {
    let pool = seeded_pool().await;
    let directory = SqlGeographyDirectory::new(pool.clone());
    let files = SqlFileRepository::new(pool);

    let profile =
        directory.find_profile(UserId(5)).await.expect("lookup").expect("active profile");
    let visible = files.list_visible(&GeographyFilter::from_profile(&profile)).await.expect("list");

    assert_eq!(
        visible.into_iter().map(|file| file.file_number).collect::<Vec<_>>(),
        vec!["EF-2026-0001"]
    );
}

#[tokio::test]
async fn seeded_stages_chain_forward() {
    let pool = seeded_pool().await;
    let store = SqlWorkflowGraphStore::new(pool);

    let next: Vec<i64> =
        store.next_stages(StageId(1)).await.expect("next").into_iter().map(|s| s.id.0).collect();
    let last = store.next_stages(StageId(3)).await.expect("next");

    assert_eq!(next, vec![2]);
    assert!(last.is_empty());
}
