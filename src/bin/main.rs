use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use reva_orchestrator::api::{AppState, create_router};
use reva_orchestrator::tools::TavilyClient;
use reva_orchestrator::{
    AnswerPath, ChatRequest, Settings, create_document_store, create_orchestrator,
    create_orchestrator_with_documents, default_registry,
};

#[derive(Parser)]
#[command(name = "reva")]
#[command(about = "Commercial real estate AI assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Bind address, e.g. 0.0.0.0:8000
        #[arg(long, env = "REVA_BIND", default_value = "0.0.0.0:8000")]
        bind: String,
    },
    /// Answer one question and print the result
    Ask {
        message: String,
        /// Comma-separated tool aliases (search, economic-data, market-analysis,
        /// property-analysis, value-proposition, document-search)
        #[arg(long, value_delimiter = ',')]
        tools: Vec<String>,
        /// Conversation session
        #[arg(long, env = "REVA_SESSION")]
        session: Option<String>,
    },
    /// List the registered tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("reva_orchestrator=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load()?;

    match cli.command {
        Commands::Serve { bind } => {
            let documents = create_document_store(&settings);
            let orchestrator = Arc::new(create_orchestrator_with_documents(
                &settings,
                documents.clone(),
            )?);
            let state = AppState {
                orchestrator,
                documents,
                web_search: TavilyClient::new(settings.tavily_api_key.clone()),
                chunk_delay: settings.stream_chunk_delay(),
            };
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Server listening on http://{}", bind);
            axum::serve(listener, app).await?;
        }
        Commands::Ask {
            message,
            tools,
            session,
        } => {
            info!(
                "Running ask command. tools={:?}, session={:?}",
                tools, session
            );
            let orchestrator = create_orchestrator(&settings)?;
            let request = ChatRequest {
                message,
                tools: Some(tools),
                session_id: session.map(Into::into),
            };
            let outcome = orchestrator.respond(&request).await?;

            match &outcome.path {
                AnswerPath::Synthesized { tools } => {
                    let names: Vec<&str> = tools.iter().map(|t| t.as_str()).collect();
                    info!("Answered from tools: {}", names.join(", "));
                }
                AnswerPath::Fallback => info!("Answered by the fallback agent"),
            }
            println!("{}", outcome.answer);
        }
        Commands::Tools => {
            let registry = default_registry(&settings, create_document_store(&settings));
            println!("{} tools:", registry.len());
            for handler in registry.handlers() {
                println!("  {}", handler.name());
                println!("    {}", handler.description());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bind_reads_environment() {
        let cli = Cli::command();
        let serve = cli.find_subcommand("serve").unwrap();
        let bind = serve.get_arguments().find(|a| a.get_id() == "bind").unwrap();
        assert_eq!(bind.get_env(), Some(std::ffi::OsStr::new("REVA_BIND")));
    }

    #[test]
    fn test_ask_parses_tool_list() {
        let cli = Cli::try_parse_from(["reva", "ask", "cap rates?", "--tools", "search,economic-data"]).unwrap();
        match cli.command {
            Commands::Ask { message, tools, .. } => {
                assert_eq!(message, "cap rates?");
                assert_eq!(tools, vec!["search", "economic-data"]);
            }
            _ => panic!("expected ask"),
        }
    }
}
