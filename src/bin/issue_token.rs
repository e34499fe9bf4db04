use clap::Parser;
use dotenvy::dotenv;
use geo_importer::config::ImporterConfig;
use geo_importer::utils::auth::create_jwt;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Issues a bearer token for the importer API, signed with `JWT_SECRET`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// User the token is issued for
    user: String,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "issue_token=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    if args.user.trim().is_empty() {
        error!("❌ User must not be empty.");
        std::process::exit(1);
    }

    let config = ImporterConfig::from_env()?;
    if std::env::var("JWT_SECRET").is_err() {
        info!("⚠️  JWT_SECRET is not set, signing with the development secret");
    }

    let token = create_jwt(&args.user, &config.jwt_secret)?;
    info!("🔑 Token for '{}' is valid for 24 hours", args.user);
    println!("{}", token);

    Ok(())
}
