use anyhow::Result;
use clap::Parser;
use common::{
    storage::{
        db::SurrealDbClient,
        types::{
            owner::Owner,
            profile::{Profile, ProfileUpdate},
        },
    },
    utils::config::get_config,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Registers a portfolio owner and prints the API key used for the owner endpoints.
#[derive(Debug, Parser)]
#[command(name = "create-owner")]
struct Args {
    /// Display name, also used as the initial profile name
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let config = get_config()?;

    let db = SurrealDbClient::new(
        &config.surrealdb_address,
        &config.surrealdb_username,
        &config.surrealdb_password,
        &config.surrealdb_namespace,
        &config.surrealdb_database,
    )
    .await?;
    db.ensure_initialized().await?;

    let owner = register(&args.name, &db).await?;
    info!(owner_id = %owner.id, "Owner created");

    println!("owner_id: {}", owner.id);
    println!("api_key:  {}", owner.api_key);
    Ok(())
}

async fn register(name: &str, db: &SurrealDbClient) -> Result<Owner> {
    let owner = Owner::create(name.trim(), db).await?;
    Profile::upsert_for_owner(
        &owner.id,
        ProfileUpdate {
            name: name.trim().to_string(),
            ..ProfileUpdate::default()
        },
        db,
    )
    .await?;
    Ok(owner)
}
