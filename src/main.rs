mod bot_commands;
mod brag;
mod config;
mod db;
mod error;
mod health;
mod llm;
mod nlu;
mod pdf;
mod timeparse;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand, ValueEnum};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot_commands::{BotState, Command};
use crate::llm::{LlmClient, OpenAiCompatClient};
use crate::nlu::IntentClassifier;

#[derive(Parser)]
#[command(name = "bragfy", about = "Bot do Telegram para registrar atividades e gerar Brag Documents")]
struct Cli {
    /// Arquivo de configuração (opcional)
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Inicia o bot (long polling) e o servidor de health-check
    Serve,
    /// Aplica as migrações pendentes do banco
    Migrate,
    /// Exporta o Brag Document de um usuário
    Brag {
        /// ID do usuário no Telegram
        #[arg(long)]
        telegram_id: i64,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, value_enum, default_value_t = ExportFormat::Text)]
        format: ExportFormat,
        /// Arquivo de saída (padrão: stdout para texto, nome gerado para PDF)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Text,
    Pdf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::Config::load_or_default(&cli.config)?;

    match cli.command {
        Cmd::Serve => run_serve(cfg).await,
        Cmd::Migrate => run_migrate(&cfg),
        Cmd::Brag {
            telegram_id,
            days,
            format,
            out,
        } => run_export(&cfg, telegram_id, days, format, out),
    }
}

fn run_migrate(cfg: &config::Config) -> anyhow::Result<()> {
    // init já migra; aqui só reportamos o estado final
    let database = db::Database::init(&cfg.database.path)?;
    let version = database.schema_version()?;
    tracing::info!(path = %cfg.database.path, version, "Database is up to date");
    Ok(())
}

fn run_export(
    cfg: &config::Config,
    telegram_id: i64,
    days: Option<u32>,
    format: ExportFormat,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let database = db::Database::init(&cfg.database.path)?;
    let Some(user) = database.find_user(telegram_id)? else {
        anyhow::bail!("user with telegram id {} not found", telegram_id);
    };

    let days = days.unwrap_or(cfg.bot.default_period_days);
    let now = bot_commands::local_now(cfg.bot.timezone_offset_hours);
    let doc = brag::collect(&database, &user, days, now)?;

    match format {
        ExportFormat::Text => match out {
            Some(path) => std::fs::write(&path, doc.render_text())?,
            None => print!("{}", doc.render_text()),
        },
        ExportFormat::Pdf => {
            let path = out.unwrap_or_else(|| PathBuf::from(pdf::file_name(&doc)));
            std::fs::write(&path, pdf::render_pdf(&doc)?)?;
            tracing::info!(path = %path.display(), activities = doc.total(), "PDF written");
        }
    }
    Ok(())
}

/// Modo servidor: long polling + health-check.
async fn run_serve(cfg: config::Config) -> anyhow::Result<()> {
    let database = Arc::new(Mutex::new(db::Database::init(&cfg.database.path)?));

    let bot = match std::env::var("TELOXIDE_TOKEN") {
        Ok(_) => Bot::from_env(),
        Err(_) => match std::env::var("TELEGRAM_BOT_TOKEN") {
            Ok(token) => Bot::new(token),
            Err(_) => anyhow::bail!("TELOXIDE_TOKEN (or TELEGRAM_BOT_TOKEN) is required"),
        },
    };

    let llm: Option<Arc<dyn LlmClient>> = match OpenAiCompatClient::from_config(&cfg.llm)? {
        Some(client) => {
            tracing::info!(model = %cfg.llm.model, "LLM summaries enabled");
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("LLM_API_KEY not set. AI summaries are disabled.");
            None
        }
    };

    if cfg.health.enabled {
        let db = database.clone();
        let port = cfg.health.port;
        tokio::spawn(async move {
            if let Err(e) = health::serve(db, port).await {
                tracing::error!(error = %e, "Health server stopped");
            }
        });
    }

    let state = Arc::new(BotState {
        db: database,
        nlu: IntentClassifier::new(&cfg.nlu),
        llm,
        cfg: cfg.bot.clone(),
    });

    // menu de comandos do Telegram
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!(error = %e, "Failed to set bot commands menu");
    }

    tracing::info!("Starting serve mode (long polling)...");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(bot_commands::handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some())
                        .endpoint(bot_commands::handle_text),
                ),
        )
        .branch(Update::filter_callback_query().endpoint(bot_commands::handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .error_handler(Arc::new(|err| {
            Box::pin(async move {
                tracing::error!(error = %err, "Dispatch error");
            })
        }))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
