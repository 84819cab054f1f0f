use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use chatrelay_core_sdk::{
    config::{self, Config},
    db,
    llm::OpenAiClient,
    server, telemetry,
};

/**
 * \brief CLI entry point: web chat relay and local chat-log tools.
 */
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about = "Minimal web chat relay for an OpenAI-compatible API")]
struct Cli {
    /** \brief Completion API key */
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    #[arg(long, env = "OPENAI_API_BASE", default_value = config::DEFAULT_API_BASE, global = true)]
    api_base: String,

    #[arg(long, env = "CHATRELAY_MODEL", default_value = config::DEFAULT_MODEL, global = true)]
    model: String,

    /** \brief SQLite file holding the chat log */
    #[arg(long, env = "CHATRELAY_DB", default_value = config::DEFAULT_DB_PATH, global = true)]
    db: PathBuf,

    /** \brief Upper bound on one completion call, in seconds */
    #[arg(long, env = "CHATRELAY_TIMEOUT_SECS", default_value_t = config::DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief Serve the chat page and JSON API on all interfaces.
     */
    Serve {
        #[arg(long, env = "PORT", default_value_t = config::DEFAULT_PORT)]
        port: u16,
    },

    /**
     * \brief Send one message, store the exchange and print the reply.
     */
    Chat {
        #[arg(long)]
        message: String,
    },

    /**
     * \brief Print the most recent stored exchanges.
     */
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /** \brief Create the chat table and exit. */
    InitDb,
}

impl Cli {
    fn config(&self, port: u16) -> Config {
        Config {
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
            model: self.model.clone(),
            db_path: self.db.clone(),
            port,
            completion_timeout: Duration::from_secs(self.timeout_secs),
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init("info").context("init logging failed")?;

    let port = match &cli.command {
        Commands::Serve { port } => *port,
        _ => config::DEFAULT_PORT,
    };
    let config = cli.config(port);

    let conn = db::open_db(&config.db_path).context("open database failed")?;
    db::initialize(&conn).context("initialize database failed")?;

    match cli.command {
        Commands::Serve { .. } => {
            drop(conn);
            server::run(config).await?;
        }
        Commands::Chat { message } => {
            drop(conn);
            let client = Arc::new(OpenAiClient::new(&config).context("build client failed")?);
            let record = server::relay_message(Arc::new(config), client, Some(message))
                .await
                .context("store exchange failed")?;
            println!("{}", record.ai_response);
        }
        Commands::History { limit } => {
            let records = db::recent_records(&conn, limit).context("load history failed")?;
            for record in records.into_iter().rev() {
                println!(
                    "#{} USER: {}\n#{} AI: {}",
                    record.id,
                    record.user_message.as_deref().unwrap_or("<none>"),
                    record.id,
                    record.ai_response
                );
            }
        }
        Commands::InitDb => {
            tracing::info!(db = %config.db_path.display(), "chat table ready");
        }
    }

    Ok(())
}
