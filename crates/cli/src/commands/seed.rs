use slotbook_db::{seed_catalog, SeedReport};

use crate::commands::{migrated_pool, prepare, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let report = seed_catalog(&pool).await.map_err(|error| ("seed_execution", error.to_string(), 6u8));
        pool.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::success("seed", summarize(report)),
        Err((error_class, message, exit_code)) => CommandResult::failure("seed", error_class, message, exit_code),
    }
}

fn summarize(report: SeedReport) -> String {
    if report.packages_inserted == 0 {
        format!("catalog already holds all {} default packages", report.packages_present)
    } else {
        format!(
            "inserted {} default packages ({} already present)",
            report.packages_inserted, report.packages_present
        )
    }
}

#[cfg(test)]
mod tests {
    use slotbook_db::SeedReport;

    use super::summarize;

    #[test]
    fn summary_distinguishes_first_and_repeat_runs() {
        assert_eq!(
            summarize(SeedReport { packages_inserted: 5, packages_present: 0 }),
            "inserted 5 default packages (0 already present)"
        );
        assert_eq!(
            summarize(SeedReport { packages_inserted: 0, packages_present: 5 }),
            "catalog already holds all 5 default packages"
        );
    }
}
