use slotbook_db::migrations;

use crate::commands::{migrated_pool, prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("migrate") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let applied = migrations::MIGRATOR.iter().count();
        pool.close().await;
        Ok::<usize, StepFailure>(applied)
    });

    match result {
        Ok(applied) => CommandResult::success("migrate", format!("schema is at migration {applied}")),
        Err((error_class, message, exit_code)) => CommandResult::failure("migrate", error_class, message, exit_code),
    }
}
