use vitrina_db::{connect_with_config, migrations, SeedCatalog, SeedResult};

use crate::commands::{exit, load_config, runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), exit::DATABASE))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), exit::MIGRATION))?;

        let seeded = SeedCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), exit::SEED))?;
        let verification = SeedCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), exit::SEED))?;
        pool.close().await;

        if !verification.all_present() {
            return Err((
                "seed_verification",
                format!("seed products missing after load: {}", verification.missing_codes.join(", ")),
                exit::SEED,
            ));
        }
        Ok::<SeedResult, (&'static str, String, u8)>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary(seeded: &SeedResult) -> String {
    let mut message = format!(
        "seed catalog loaded: {} inserted, {} already present",
        seeded.inserted.len(),
        seeded.skipped.len()
    );
    if !seeded.inserted.is_empty() {
        message.push_str(&format!(" (inserted: {})", seeded.inserted.join(", ")));
    }
    message
}
