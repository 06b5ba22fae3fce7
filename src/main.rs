//! roadmap-client schema tool
//!
//! Prints the DDL derived from the schema registry or pushes it to the
//! configured SQLite database.

use anyhow::{Context, Result, bail};

use roadmap_client::cli::CliOptions;
use roadmap_client::config::Config;
use roadmap_client::logging::init_tracing;
use roadmap_client::schema::SchemaRegistry;
use roadmap_client::Client;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let options = CliOptions::from_args();
    if options.help {
        println!("{}", CliOptions::usage());
        return Ok(());
    }

    let mut config = Config::from_env()?;
    if let Some(url) = options.database_url.clone() {
        config.database_url = url;
    }
    init_tracing(&config.log_config())?;

    let registry = SchemaRegistry::global();
    let problems = registry.validate();
    if !problems.is_empty() {
        bail!("schema registry is inconsistent: {}", problems.join("; "));
    }

    if options.print_schema {
        for statement in registry.ddl() {
            println!("{statement};");
        }
    }

    if options.push {
        let client = Client::connect_with_retry(&config.database_config())
            .await
            .with_context(|| format!("failed to connect to {}", config.database_url))?;
        let result = client.push_schema().await;
        client.disconnect().await;

        for table in &result.tables_created {
            println!("created table {table}");
        }
        for (table, column) in &result.columns_added {
            println!("added column {table}.{column}");
        }
        if !result.is_ok() {
            bail!("schema push failed: {}", result.errors.join("; "));
        }
        tracing::info!(
            tables = result.tables_created.len(),
            columns = result.columns_added.len(),
            indexes = result.indexes_created,
            "Schema is up to date"
        );
    }

    if !options.push && !options.print_schema {
        println!("{}", CliOptions::usage());
    }

    Ok(())
}
