use crate::commands::{with_database, CommandFailure, CommandResult};
use efiling_db::{migrations, DbPool, DemoSeedDataset, SeedHighlight};

pub fn run() -> CommandResult {
    match with_database("seed", |_config, pool| load_and_verify(pool)) {
        Ok(highlights) => CommandResult::success("seed", render_highlights(&highlights)),
        Err(failure) => failure,
    }
}

async fn load_and_verify(pool: DbPool) -> Result<Vec<SeedHighlight>, CommandFailure> {
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), 5u8))?;

    let seed_result = DemoSeedDataset::load(&pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    let verification = DemoSeedDataset::verify(&pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if !verification.all_present {
        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        return Err(("seed_verification", verification_message(&failed_checks), 6u8));
    }

    Ok(seed_result.highlights)
}

fn render_highlights(highlights: &[SeedHighlight]) -> String {
    let lines: Vec<String> = highlights
        .iter()
        .map(|highlight| format!("  - {}: {}", highlight.name, highlight.description))
        .collect();
    format!("demo seed dataset loaded:\n{}", lines.join("\n"))
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use efiling_db::SeedHighlight;

    use super::{render_highlights, verification_message};

    #[test]
    fn verification_error_message_targets_failed_checks() {
        assert_eq!(
            verification_message(&["stages", "user-zones"]),
            "Seed verification failed for checks: stages, user-zones"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "Some seed data failed to load");
    }

    #[test]
    fn highlights_render_one_line_each() {
        let message = render_highlights(&[
            SeedHighlight { name: "route", description: "a -> b" },
            SeedHighlight { name: "sla", description: "48h" },
        ]);

        assert_eq!(message, "demo seed dataset loaded:\n  - route: a -> b\n  - sla: 48h");
    }
}
