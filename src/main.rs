use clap::{Arg, Command};
use crust::approval::ConsoleApproval;
use crust::assistant::Assistant;
use crust::aur::PackageAuditor;
use crust::chat_client;
use crust::completion::{CompletionEngine, ShellHelper};
use crust::config::Config;
use crust::executor::{Executor, SystemProcessRunner};
use crust::history::HistoryStore;
use crust::http_client::{HttpClient, ReqwestHttpClient};
use crust::session::{KnownCommands, Session};
use crust::shell::{RustylineReader, Services, Shell};
use std::io;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("CRUST_LOG").unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let matches = Command::new("crust")
        .about("Interactive shell with an integrated assistant")
        .long_about("crust runs each line with the interpreter it looks written for, and answers .question lines with an assistant that can run commands and edit files after you approve")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(Arg::new("set-api-key")
            .long("set-api-key")
            .help("Set the Cohere API key")
            .value_name("API_KEY")
            .num_args(1))
        .arg(Arg::new("config")
            .long("config")
            .help("Show configuration information")
            .action(clap::ArgAction::SetTrue))
        .subcommand(Command::new("capk")
            .about("Check an AUR package's PKGBUILD for malicious content")
            .arg(Arg::new("package")
                .help("AUR package name")
                .required(true)))
        .get_matches();

    if let Some(api_key) = matches.get_one::<String>("set-api-key") {
        let mut config = Config::load()?;
        config.set_api_key(api_key.clone())?;
        println!("API key saved successfully");
        return Ok(());
    }

    if matches.get_flag("config") {
        Config::show_config_info()?;
        return Ok(());
    }

    let config = Config::load()?;
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let client = chat_client::from_config(&config, http.clone());
    let auditor = PackageAuditor::new(http, client.clone());

    if let Some(capk) = matches.subcommand_matches("capk") {
        let package = capk
            .get_one::<String>("package")
            .map(String::as_str)
            .unwrap_or_default();
        info!("Checking AUR package {}", package);
        let verdict = auditor.audit(package, &mut io::stdout()).await?;
        println!("{}", verdict);
        return Ok(());
    }

    // Own SIGINT for the whole session: Ctrl-C must never kill the shell.
    let _sigint = signal(SignalKind::interrupt())?;

    let history_path = Config::history_path()?;
    let mut history = HistoryStore::new(config.history_size);
    history.load(&history_path);
    info!("Restored {} history entries", history.len());

    let known_commands = Arc::new(KnownCommands::load(config.aliases.keys()));
    let cwd = std::env::current_dir()?;
    info!("Starting in {}", cwd.display());

    let engine = CompletionEngine::new(known_commands.clone(), dirs::home_dir(), cwd.clone());
    let mut reader = RustylineReader::new(ShellHelper::new(engine), &history, config.history_size)?;

    let executor = Executor::new(Arc::new(SystemProcessRunner));
    let services = Services {
        executor: executor.clone(),
        assistant: Assistant::new(
            client,
            Box::new(ConsoleApproval),
            executor,
            config.continue_after_read,
        ),
        auditor,
    };

    let session = Session::new(cwd, history, known_commands);
    let mut shell = Shell::new(session, config, services, io::stdout()).with_history_path(history_path);
    shell.run(&mut reader).await
}
