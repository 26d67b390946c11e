//! experimentd - guess-the-number experiment server
//!
//! CLI entry point for serving, playing and operating an experiment.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use experimentd::cli::{Cli, Command, OutputFormat, get_log_path};
use experimentd::client::{ControlClient, run_interactive};
use experimentd::config::Config;
use experimentd::coordinator::{ClientInfo, FailedDelivery, Phase, StatusReport, Verdict};
use experimentd::server::Server;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Write to the log file, not stdout/stderr; the player terminal is interactive
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(socket) = &cli.socket {
        config.server.control_socket = socket.clone();
    }
    info!(
        "experimentd loaded config: listen={}, control-socket={}",
        config.server.listen,
        config.server.control_socket.display()
    );

    let control = ControlClient::with_socket_path(config.server.control_socket.clone());

    match cli.command {
        Some(Command::Serve { listen, seed }) => cmd_serve(config, listen, seed).await,
        Some(Command::Play { name, addr }) => {
            let addr = addr.unwrap_or_else(|| config.server.listen.clone());
            run_interactive(&addr, &name).await
        }
        Some(Command::Start { target }) => cmd_start(&control, target).await,
        Some(Command::End) => cmd_end(&control).await,
        Some(Command::Grade { name }) => cmd_grade(&control, &name).await,
        Some(Command::Pending) => cmd_pending(&control).await,
        Some(Command::Leaderboard { format }) => cmd_leaderboard(&control, format).await,
        Some(Command::Clients { format }) => cmd_clients(&control, format).await,
        Some(Command::Status { format }) => cmd_status(&control, format).await,
        Some(Command::Ping) => {
            let version = control.ping().await?;
            println!("{} (server {})", "pong".green(), version);
            Ok(())
        }
        Some(Command::Shutdown) => {
            control.shutdown().await?;
            println!("Server stopping");
            Ok(())
        }
        Some(Command::Logs { follow, lines }) => cmd_logs(follow, lines),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Run the server until Ctrl+C, SIGTERM or an operator shutdown
async fn cmd_serve(mut config: Config, listen: Option<String>, seed: Option<u64>) -> Result<()> {
    if let Some(listen) = listen {
        config.server.listen = listen;
    }
    if seed.is_some() {
        config.coordinator.seed = seed;
    }

    let server = Server::bind(&config).await?;
    println!("Listening for players on {}", server.player_addr()?);
    println!("Operator socket: {}", server.socket_path().display());

    server.run(shutdown_signal()).await?;
    println!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

async fn cmd_start(control: &ControlClient, target: Option<i32>) -> Result<()> {
    let report = control.start(target).await?;
    println!("{} round {}", "Started".green().bold(), report.round);
    println!("Notified {} client(s)", report.notified);
    print_failures(&report.failures);
    Ok(())
}

async fn cmd_end(control: &ControlClient) -> Result<()> {
    let report = control.end().await?;
    println!("{} round {}", "Ended".magenta().bold(), report.round);
    println!("Notified {} client(s)", report.notified);
    print_failures(&report.failures);
    println!();
    print!("{}", report.summary);
    Ok(())
}

async fn cmd_grade(control: &ControlClient, name: &str) -> Result<()> {
    let report = control.grade(name).await?;
    let verdict = match report.verdict {
        Verdict::Correct => report.verdict.message().green().bold(),
        _ => report.verdict.message().yellow(),
    };
    println!("{}: guessed {} -> {}", report.name.bold(), report.guess, verdict);
    if let Some(failure) = &report.failure {
        print_failures(std::slice::from_ref(failure));
    }
    Ok(())
}

async fn cmd_pending(control: &ControlClient) -> Result<()> {
    let names = control.pending().await?;
    if names.is_empty() {
        println!("No pending guesses");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

async fn cmd_leaderboard(control: &ControlClient, format: OutputFormat) -> Result<()> {
    let standings = control.leaderboard().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&standings)?),
        OutputFormat::Text => print!("{}", standings.render("Leaderboard")),
    }
    Ok(())
}

async fn cmd_clients(control: &ControlClient, format: OutputFormat) -> Result<()> {
    let clients = control.clients().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&clients)?),
        OutputFormat::Text => print_clients(&clients),
    }
    Ok(())
}

async fn cmd_status(control: &ControlClient, format: OutputFormat) -> Result<()> {
    let report = control.status().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_status(&report),
    }
    Ok(())
}

fn print_clients(clients: &[ClientInfo]) {
    if clients.is_empty() {
        println!("No clients connected");
        return;
    }
    println!("{:<20} {:>8} {:>6}  CONNECTED", "NAME", "GUESSES", "LAST");
    for client in clients {
        let last = client.last_guess.map(|g| g.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:>8} {:>6}  {}",
            client.name,
            client.guesses,
            last,
            client.connected_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

fn print_status(report: &StatusReport) {
    let phase = match report.phase {
        Phase::Running => report.phase.to_string().green().bold(),
        Phase::Ended => report.phase.to_string().magenta(),
        Phase::NotStarted => report.phase.to_string().dimmed(),
    };
    println!("experimentd status");
    println!("------------------");
    println!("Phase:    {}", phase);
    println!("Round:    {}", report.round);
    println!("Clients:  {}", report.clients);
    println!("Pending:  {}", report.pending);
    println!();
    println!("Requests handled:  {}", report.metrics.requests_handled);
    println!("Guesses received:  {}", report.metrics.guesses_received);
    println!("Guesses graded:    {}", report.metrics.guesses_graded);
    println!("Notices sent:      {}", report.metrics.notices_sent);
    println!("Delivery failures: {}", report.metrics.delivery_failures);
}

fn print_failures(failures: &[FailedDelivery]) {
    for failure in failures {
        println!(
            "{} could not notify {}: {}",
            "warning:".yellow().bold(),
            failure.name,
            failure.reason
        );
    }
}

/// Show logs
fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    let log_path: PathBuf = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();

        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;

        child.wait()?;
    } else {
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let reader = BufReader::new(file);
        let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

        let start = all_lines.len().saturating_sub(lines);
        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }

    Ok(())
}
