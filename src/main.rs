use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aptitude_interview::adapters::ai::LlmProvider;
use aptitude_interview::adapters::http::{app_router, InterviewHandlers};
use aptitude_interview::adapters::memory::{InMemoryConversationRepository, InMemorySubjectCatalog};
use aptitude_interview::adapters::postgres::PostgresConversationRepository;
use aptitude_interview::adapters::rate_limiter::{InMemoryRateLimiter, RedisRateLimiter};
use aptitude_interview::application::{
    AdmissionGuard, CreateConversationHandler, GetConversationHandler, InterviewOrchestrator,
    OrchestratorSettings, ResilientInvoker, RetryPolicy,
};
use aptitude_interview::config::{AppConfig, DatabaseConfig};
use aptitude_interview::domain::interview::PromptCatalog;
use aptitude_interview::ports::{ConversationRepository, RateLimiter, SubjectCatalog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let prompts = Arc::new(PromptCatalog::standard(config.interview.prompt_version)?);

    let subjects: Arc<dyn SubjectCatalog> = match &config.interview.subjects_file {
        Some(path) => Arc::new(InMemorySubjectCatalog::from_yaml_file(path)?),
        None => {
            tracing::warn!("No subject catalog configured; only aptitude interviews are available");
            Arc::new(InMemorySubjectCatalog::empty())
        }
    };

    let repository: Arc<dyn ConversationRepository> = match &config.database {
        Some(database) => Arc::new(PostgresConversationRepository::new(connect(database).await?)),
        None => {
            tracing::warn!("No database configured; conversations are kept in memory");
            Arc::new(InMemoryConversationRepository::new())
        }
    };

    let limiter: Arc<dyn RateLimiter> = match &config.redis {
        Some(redis) => Arc::new(RedisRateLimiter::connect(&redis.url, config.throttle.clone()).await?),
        None => Arc::new(InMemoryRateLimiter::new(config.throttle.clone())),
    };

    let provider = LlmProvider::from_config(&config.ai)?;
    tracing::info!(model = provider.model(), "LLM provider ready");
    let invoker = ResilientInvoker::new(Arc::new(provider), RetryPolicy::from_config(&config.ai));

    let handlers = InterviewHandlers::new(
        Arc::new(CreateConversationHandler::new(
            repository.clone(),
            subjects.clone(),
            prompts.clone(),
        )),
        Arc::new(InterviewOrchestrator::new(
            repository.clone(),
            subjects,
            invoker,
            prompts,
            OrchestratorSettings::from_config(&config.interview, &config.ai),
        )),
        Arc::new(GetConversationHandler::new(repository)),
        AdmissionGuard::new(limiter),
    );

    let app = app_router(handlers, &config.server);
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect(database: &DatabaseConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .connect(&database.url)
        .await?;

    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }
    Ok(pool)
}
