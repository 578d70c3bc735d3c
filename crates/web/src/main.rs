use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use engine::events::EventSink;
use engine::machine::StateMachine;
use engine::VoteTally;
use storage::Database;
use sync::{RemoteArchive, SyncError, SyncResolver};

mod broker;
mod config;
mod error;
mod handlers;
mod middleware;
mod routes;

use broker::Broker;
use config::Config;
use middleware::auth::{ApiKeys, JudgeTokens};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::meets::list_meets,
        handlers::meets::get_meet,
        handlers::meets::create_meet,
        handlers::meets::create_registration,
        handlers::meets::weigh_in,
        handlers::meets::get_rankings,
        handlers::athletes::list_athletes,
        handlers::athletes::get_athlete,
        handlers::live::cast_vote,
        handlers::live::initialize,
        handlers::live::next,
        handlers::live::declare,
        handlers::live::timer,
        handlers::live::get_state,
        handlers::live::get_queue,
        handlers::live::open_ballots,
        handlers::live::issue_judge_token,
        handlers::meets::list_lifts,
        handlers::meets::list_meet_types,
    ),
    components(
        schemas(
            storage::models::Athlete,
            storage::models::Sex,
            storage::models::Meet,
            storage::models::MeetType,
            storage::models::Lift,
            storage::models::Registration,
            storage::models::Opener,
            storage::models::Flight,
            storage::models::Group,
            storage::models::GroupEntry,
            storage::models::Attempt,
            storage::models::AttemptStatus,
            storage::models::CurrentState,
            storage::models::Phase,
            storage::models::WeightCategory,
            storage::models::AgeCategory,
            engine::ordering::QueueEntry,
            engine::ranking::Rankings,
            engine::ranking::CategoryRanking,
            engine::ranking::RankedEntry,
            engine::tally::JudgeRole,
            engine::tally::Vote,
            handlers::live::VoteRequest,
            handlers::live::VoteAck,
            handlers::live::InitializeRequest,
            handlers::live::DeclareRequest,
            handlers::live::TimerRequest,
            handlers::live::JudgeTokenRequest,
            handlers::live::JudgeTokenResponse,
            handlers::meets::CreateMeetRequest,
            handlers::meets::CreateRegistrationRequest,
            handlers::meets::WeighInRequest,
            handlers::meets::MeetDetailResponse,
            handlers::meets::FlightDetail,
            handlers::meets::GroupDetail,
            handlers::meets::EntryDetail,
        )
    ),
    tags(
        (name = "meets", description = "Meet composition and results"),
        (name = "athletes", description = "Athlete registry"),
        (name = "live", description = "Realtime platform control"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("API Key")
                        .build(),
                ),
            )
        }
    }
}

#[derive(Parser)]
#[command(name = "meetlive")]
#[command(about = "Streetlifting meet-day engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the realtime service
    Serve,
    /// Create the local schema
    Initdb {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Populate demo data for local development
    Seed {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Upload a finished meet to the remote archive
    Sync {
        meet_code: String,

        /// Replace the meet if it is already archived
        #[arg(long)]
        force: bool,

        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        #[arg(long, env = "REMOTE_DATABASE_URL")]
        remote_database_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_target(true)
        .init();

    match cli.command {
        Commands::Serve => serve().await,
        Commands::Initdb { database_url } => {
            let db = Database::new(&database_url)
                .await
                .context("Failed to open database")?;
            db.run_migrations().await.context("Failed to run migrations")?;
            tracing::info!("Local schema is up to date");
            Ok(())
        }
        Commands::Seed { database_url } => {
            let db = Database::new(&database_url)
                .await
                .context("Failed to open database")?;
            db.run_migrations().await.context("Failed to run migrations")?;
            storage::seed::seed(&db).await.context("Failed to seed database")?;
            tracing::info!("Seed data in place");
            Ok(())
        }
        Commands::Sync { meet_code, force, database_url, remote_database_url } => {
            run_sync(&meet_code, force, &database_url, &remote_database_url).await
        }
    }
}

/// Exit codes: 0 on success, 1 on failure, 2 when already synced.
async fn run_sync(
    meet_code: &str,
    force: bool,
    database_url: &str,
    remote_database_url: &str,
) -> anyhow::Result<()> {
    let local = Database::new(database_url)
        .await
        .context("Failed to open local database")?;
    let remote = RemoteArchive::connect(remote_database_url)
        .await
        .context("Failed to open remote archive")?;
    remote
        .run_migrations()
        .await
        .context("Failed to prepare remote archive schema")?;

    match SyncResolver::new(&local, &remote).sync_meet(meet_code, force).await {
        Ok(report) => {
            tracing::info!(
                athletes = report.athletes_upserted,
                results = report.results_written,
                records = report.records_promoted,
                "meet {meet_code} archived"
            );
            Ok(())
        }
        Err(SyncError::AlreadySynced(code)) => {
            tracing::warn!("meet {code} is already archived; re-run with --force to replace");
            std::process::exit(2);
        }
        Err(e) => {
            tracing::error!("sync failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    tracing::info!("Starting MeetLive realtime service");

    let config = Config::from_env().context("Failed to load configuration")?;

    let db = Database::new(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    db.run_migrations().await.context("Failed to run migrations")?;

    let tally = Arc::new(VoteTally::new());
    let broker = Arc::new(Broker::default());
    let machine = Arc::new(StateMachine::new(
        db.clone(),
        tally,
        broker.clone() as Arc<dyn EventSink>,
    ));

    // CurrentState survives restarts; report what we woke up to.
    let restored = machine.current().await?;
    tracing::info!(phase = ?restored.phase, meet_id = ?restored.meet_id, "state restored");

    let db_data = web::Data::new(db);
    let broker_data = web::Data::from(broker);
    let machine_data = web::Data::from(machine);
    let api_keys = web::Data::new(ApiKeys::from_comma_separated(&config.api_keys));
    let judge_tokens = web::Data::new(JudgeTokens::new(&config.judge_token_secret));
    let config_data = web::Data::new(config.clone());

    let bind_address = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on http://{}", bind_address);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", bind_address);

    let openapi = ApiDoc::openapi();
    let cors_origin = config.cors_origin.clone();

    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .supports_credentials()
                .max_age(3600),
            None => Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
        };

        App::new()
            .wrap(cors)
            .app_data(db_data.clone())
            .app_data(broker_data.clone())
            .app_data(machine_data.clone())
            .app_data(api_keys.clone())
            .app_data(judge_tokens.clone())
            .app_data(config_data.clone())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            .configure(routes::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
