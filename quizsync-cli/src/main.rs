use clap::{Parser, Subcommand};
use quizsync_cli::application::{execute, render, simulate, Flow, SimulationConfig, UserCommand};
use quizsync_cli::{CliError, FileProgressStore, FileQuizProvider, LogConfig, Result};
use quizsync_core::{bootstrap, ProgressStore, SessionId, Timestamp};
use quizsync_p2p::{
    DeviceDescriptor, DeviceKind, IceServer, MatchboxConfig, MatchboxTransport, Message, SyncConfig,
    SyncEvent, SyncSession, SyncSessionBuilder, DEFAULT_SIGNALLING_SERVER,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "quizsync")]
#[command(
    version,
    about = "Quizsync - study one quiz on several devices at once"
)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Serve tokio-console on 127.0.0.1:6669
    #[cfg(feature = "console")]
    #[arg(long, global = true)]
    console: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Study a quiz, synchronized with the user's other devices
    Run {
        /// Matchbox signalling server URL
        #[arg(short = 's', long, default_value = DEFAULT_SIGNALLING_SERVER)]
        server: String,

        /// Directory holding `<session>.json` quizzes and `settings.json`
        #[arg(short = 'q', long)]
        quiz_dir: PathBuf,

        /// Where progress is stored (defaults to the quiz directory)
        #[arg(short = 'p', long)]
        progress_dir: Option<PathBuf>,

        /// Session (quiz) identifier
        #[arg(short = 'i', long)]
        session: String,

        /// User identifier shared by all of this user's devices
        #[arg(short = 'u', long)]
        user: String,

        /// Name shown to the other devices
        #[arg(short = 'n', long, default_value = "terminal")]
        device_name: String,

        /// desktop, mobile, tablet or unknown
        #[arg(long, default_value = "desktop")]
        device_kind: DeviceKind,

        /// TURN server URL (optional, format: turn:host:port)
        #[arg(long)]
        turn_server: Option<String>,

        /// TURN username (required if turn-server is set)
        #[arg(long)]
        turn_username: Option<String>,

        /// TURN credential (required if turn-server is set)
        #[arg(long)]
        turn_credential: Option<String>,

        /// Study alone even if the settings enable synchronization
        #[arg(long)]
        no_sync: bool,
    },

    /// Run several devices in-process and print how they converge
    Simulate {
        /// Number of devices
        #[arg(short = 'd', long, default_value_t = 3)]
        devices: usize,

        /// Seed for question order
        #[arg(long, default_value_t = 7)]
        seed: u64,

        /// Keep the host alive for the whole run
        #[arg(long)]
        keep_host: bool,
    },

    /// Print the JSON schema of the peer wire messages
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::quiet().with_level(cli.log_level);
    if cli.json_logs {
        log_config = log_config.with_json();
    }
    #[cfg(feature = "console")]
    if cli.console {
        log_config = log_config.with_console();
    }
    log_config.init().map_err(CliError::Logging)?;

    match cli.command {
        Commands::Run {
            server,
            quiz_dir,
            progress_dir,
            session,
            user,
            device_name,
            device_kind,
            turn_server,
            turn_username,
            turn_credential,
            no_sync,
        } => {
            let matchbox = build_config(&server, turn_server, turn_username, turn_credential)?;
            let device = DeviceDescriptor::new(device_name, device_kind);
            let options = RunOptions {
                quiz_dir,
                progress_dir,
                session: SessionId::new(session),
                user,
                device,
                no_sync,
            };
            run(matchbox, options).await?;
        }
        Commands::Simulate {
            devices,
            seed,
            keep_host,
        } => {
            let config = SimulationConfig {
                devices: devices.max(1),
                seed,
                crash_host: !keep_host,
            };
            for report in simulate(&config)? {
                let role = report
                    .role
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "none".to_string());
                println!(
                    "{:<10} {:<8} {:<6} ✔ {} ✘ {}  {}",
                    report.name,
                    if report.alive { "alive" } else { "crashed" },
                    role,
                    report.correct_count,
                    report.wrong_count,
                    report.current.unwrap_or_default()
                );
            }
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(Message);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

fn build_config(
    server: &str,
    turn_server: Option<String>,
    turn_username: Option<String>,
    turn_credential: Option<String>,
) -> Result<MatchboxConfig> {
    let mut config = MatchboxConfig::new(server);

    if let Some(turn_url) = turn_server {
        match (turn_username, turn_credential) {
            (Some(username), Some(credential)) => {
                info!("Using TURN server: {}", turn_url);
                let mut servers = IceServer::default_stun_servers();
                servers.push(IceServer::turn(turn_url, username, credential));
                config = config.with_ice_servers(servers);
            }
            _ => {
                return Err(CliError::InvalidConfig(
                    "TURN server requires both username and credential".to_string(),
                ));
            }
        }
    }

    Ok(config)
}

struct RunOptions {
    quiz_dir: PathBuf,
    progress_dir: Option<PathBuf>,
    session: SessionId,
    user: String,
    device: DeviceDescriptor,
    no_sync: bool,
}

async fn run(matchbox: MatchboxConfig, options: RunOptions) -> Result<()> {
    if !options.quiz_dir.is_dir() {
        return Err(CliError::missing_directory(options.quiz_dir));
    }
    let progress_dir = options
        .progress_dir
        .unwrap_or_else(|| options.quiz_dir.clone());
    if !progress_dir.is_dir() {
        return Err(CliError::missing_directory(progress_dir));
    }

    let provider = FileQuizProvider::new(&options.quiz_dir);
    let mut store = FileProgressStore::new(progress_dir);
    let mut rng = StdRng::from_entropy();
    let boot = bootstrap(
        &provider,
        &store,
        &options.session,
        Timestamp::now(),
        &mut rng,
    );

    let mut builder = SyncSessionBuilder::from_bootstrap(boot, &options.session, &options.user)
        .config(SyncConfig::new(options.device.clone()));
    if options.no_sync {
        builder = builder.sync_enabled(false);
    }
    let transport = MatchboxTransport::new(matchbox, options.device);
    let mut sync = builder.build(transport);

    info!("🚀 Starting session {} as {}", options.session, sync.rendezvous());
    sync.start();
    println!("{}", render::view(&sync.view(Timestamp::now())));
    println!("(type `help` for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interval = tokio::time::interval(Duration::from_millis(50));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sync.poll();
                report_events(&mut sync, &mut store, &options.session, true);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match line.parse::<UserCommand>() {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                match execute(command, &mut sync, &mut store, &options.session, Timestamp::now()) {
                    Ok((Flow::Quit, output)) => {
                        println!("{}", output);
                        break;
                    }
                    Ok((Flow::Continue, output)) => println!("{}", output),
                    Err(e) => println!("{}", e),
                }
                // the command already printed the fresh view
                report_events(&mut sync, &mut store, &options.session, false);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    if let Err(e) = store.save_progress(&options.session, &sync.progress(Timestamp::now())) {
        warn!("⚠️ Could not save progress on exit: {}", e);
    }
    sync.shutdown();
    Ok(())
}

/// Print notices and persist progress whenever the shared state moved
fn report_events<S: ProgressStore>(
    sync: &mut SyncSession<MatchboxTransport>,
    store: &mut S,
    session: &SessionId,
    redraw: bool,
) {
    let mut changed = false;
    for event in sync.drain_events() {
        if matches!(event, SyncEvent::StateChanged | SyncEvent::AnswerChecked { .. }) {
            changed = true;
        }
        if let Some(notice) = render::event(&event) {
            println!("{}", notice);
        }
        if redraw && matches!(event, SyncEvent::StateChanged | SyncEvent::Synced { .. }) {
            println!("{}", render::view(&sync.view(Timestamp::now())));
        }
    }

    if changed {
        if let Err(e) = store.save_progress(session, &sync.progress(Timestamp::now())) {
            warn!("⚠️ Could not save progress: {}", e);
        }
    }
}
