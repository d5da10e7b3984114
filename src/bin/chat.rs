//! aidb - chat with your PostgreSQL database
//!
//! Connects to the database from `DB_*` settings, then runs a REPL where
//! every line is one turn of the assistant. Slash commands inspect or reset
//! the session.

use std::path::PathBuf;
use std::sync::Arc;

use aidb::agent::{DatabaseAssistant, LoopCallback, MemoryPolicy, ToolObservation, GREETING};
use aidb::config::{load_config, validate_config, Config, LogFormat};
use aidb::database::{DatabaseGateway, PgGateway};
use aidb::Result;

use async_trait::async_trait;
use clap::Parser;
use console::style;
use dialoguer::{theme::ColorfulTheme, Input};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Manage a PostgreSQL database through natural-language chat
#[derive(Parser, Debug)]
#[command(name = "aidb")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to AIDB_CONFIG or the user config dir)
    #[arg(short, long, env = "AIDB_CONFIG")]
    config: Option<PathBuf>,

    /// Chat model to use (overrides configuration)
    #[arg(short, long)]
    model: Option<String>,

    /// Remember only the last N exchanges
    #[arg(long, value_name = "TURNS")]
    memory_window: Option<usize>,

    /// Show tool calls and their results
    #[arg(short, long)]
    verbose: bool,
}

/// Prints tool activity while a turn runs
struct ShellProgress {
    verbose: bool,
}

#[async_trait]
impl LoopCallback for ShellProgress {
    async fn on_tool_executed(&self, tool_name: &str, observation: &ToolObservation) {
        let mark = if observation.success {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!(
            "   {} {} {}",
            mark,
            style(tool_name).yellow().bold(),
            style(format!("({}ms)", observation.duration_ms)).dim()
        );
        if self.verbose {
            println!("     {}", style(truncate(&observation.content, 300)).dim());
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        format!("{},aidb=debug", config.log.level)
    } else {
        config.log.level.clone()
    };
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match config.log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.without_time().init(),
    }
}

fn load(args: &Args) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(ref model) = args.model {
        config.openai.model = model.clone();
    }
    if let Some(turns) = args.memory_window {
        config.agent.memory = MemoryPolicy::SlidingWindow { turns };
    }
    Ok(config)
}

fn print_banner(assistant: &DatabaseAssistant) {
    println!();
    println!("{}", style("aidb - database assistant").cyan().bold());
    println!(
        "   {} Model: {}",
        style("✓").green(),
        style(assistant.model_name()).cyan()
    );
    println!(
        "   {} Tools: {}",
        style("✓").green(),
        assistant.tools().names().join(", ")
    );
    println!("   Type {} for available commands.", style("/help").yellow());
    println!();
    println!("   {}: {}", style("Agent").cyan().bold(), GREETING);
    println!();
}

fn print_help() {
    println!();
    println!("   {}", style("Available Commands:").cyan().bold());
    println!("   {}    - List tables in the public schema", style("/tables").yellow());
    println!("   {}   - Show the conversation so far", style("/history").yellow());
    println!("   {}     - Forget the conversation", style("/clear").yellow());
    println!("   {}      - Show this help", style("/help").yellow());
    println!("   {}      - Exit", style("/quit").yellow());
    println!();
}

fn print_history(assistant: &DatabaseAssistant) {
    let turns = assistant.memory().turns();
    println!();
    if turns.is_empty() {
        println!("   {}", style("(empty)").dim());
    }
    for turn in turns {
        let at = turn.at.format("%H:%M:%S").to_string();
        println!("   {} {}: {}", style(&at).dim(), style("You").green().bold(), turn.user);
        println!("   {} {}: {}", style(&at).dim(), style("Agent").cyan().bold(), turn.reply);
    }
    println!();
}

async fn print_tables(gateway: &Arc<dyn DatabaseGateway>) {
    println!();
    match gateway.list_tables().await {
        Ok(tables) if tables.is_empty() => println!("   {}", style("(no tables)").dim()),
        Ok(tables) => {
            for table in tables {
                println!("   {} {}", style("•").cyan(), table);
            }
        }
        Err(e) => println!("   {} {}", style("✗").red(), e),
    }
    println!();
}

async fn run_repl(mut assistant: DatabaseAssistant, verbose: bool) -> Result<()> {
    let theme = ColorfulTheme::default();
    let progress = ShellProgress { verbose };
    print_banner(&assistant);

    loop {
        let line: String = match Input::with_theme(&theme)
            .with_prompt(style("You").green().bold().to_string())
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(e) => {
                // Ctrl-C / Ctrl-D end the session
                info!("Input closed: {}", e);
                println!("\nGoodbye!\n");
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match input.to_lowercase().as_str() {
                "/quit" | "/exit" | "/q" => {
                    println!("\nGoodbye!\n");
                    break;
                }
                "/clear" => {
                    assistant.reset();
                    println!("   {} Conversation cleared.\n", style("✓").green());
                }
                "/history" => print_history(&assistant),
                "/tables" => print_tables(assistant.tools().gateway()).await,
                "/help" | "/?" => print_help(),
                other => println!(
                    "   {} Unknown command {}. Type {} for help.\n",
                    style("⚠").yellow(),
                    other,
                    style("/help").yellow()
                ),
            }
            continue;
        }

        match assistant.run_agent_with_callback(input, &progress).await {
            Ok(report) => {
                println!();
                println!("   {}: {}", style("Agent").cyan().bold(), report.reply);
                println!();
            }
            Err(e) => {
                error!("Turn failed: {}", e);
                println!();
                println!("   {} {}", style("✗").red(), e);
                println!();
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = load(&args)?;
    init_logging(&config, args.verbose);

    for issue in validate_config(&config) {
        warn!("{}", issue);
    }

    let gateway: Arc<dyn DatabaseGateway> = match PgGateway::connect(&config.database).await {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            eprintln!("{} Could not connect to the database: {}", style("✗").red(), e);
            return Err(e);
        }
    };

    let assistant = DatabaseAssistant::from_config(&config, gateway)?;
    run_repl(assistant, args.verbose).await
}
