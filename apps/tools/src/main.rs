use anyhow::Result;
use clap::{Parser, Subcommand};
use server_api::{seed::seed_reference_data, ApiContext};
use shared::{
    domain::{AgeCategoryId, ProcessId, RegionId, RequirementScope},
    error::ApiException,
};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/docu_verify.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the demo reference data into an empty database.
    Seed,
    /// Print the effective document list for a region.
    Resolve {
        process_id: i64,
        age_category_id: i64,
        region_id: i64,
    },
    /// Print the stored rows of one scope; omit the region for nationwide rows.
    Scope {
        process_id: i64,
        age_category_id: i64,
        region_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let ctx = ApiContext { storage };

    match cli.command {
        Command::Seed => {
            let report = seed_reference_data(&ctx)
                .await
                .map_err(ApiException::from)?;
            if report.seeded {
                println!("seeded {} requirement rows", report.requirements);
            } else {
                println!("reference data already present; nothing to do");
            }
        }
        Command::Resolve {
            process_id,
            age_category_id,
            region_id,
        } => {
            let result = server_api::resolve_requirements(
                &ctx,
                ProcessId(process_id),
                AgeCategoryId(age_category_id),
                RegionId(region_id),
            )
            .await
            .map_err(ApiException::from)?;
            if result.documents.is_empty() {
                println!("no requirements");
            }
            for item in result.documents {
                println!(
                    "{:>3}  {}  {}",
                    item.sort_order,
                    item.document_name,
                    item.step_description.unwrap_or_default()
                );
            }
        }
        Command::Scope {
            process_id,
            age_category_id,
            region_id,
        } => {
            let scope = RequirementScope::new(
                ProcessId(process_id),
                AgeCategoryId(age_category_id),
                region_id.map(RegionId),
            );
            let rows = server_api::list_scope_requirements(&ctx, scope)
                .await
                .map_err(ApiException::from)?;
            for row in rows {
                println!(
                    "requirement_id={} document_id={} sort_order={} {}",
                    row.requirement_id,
                    row.document_id,
                    row.sort_order,
                    row.step_description.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
