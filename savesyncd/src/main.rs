use std::sync::Arc;

use savesyncd::config::SyncConfig;
use savesyncd::coordinator::{SyncCoordinator, SyncReport};
use savesyncd::credentials::CredentialsStore;
use savesyncd::session::DriveSession;
use savesyncd::state::SyncStateStore;
use tracing_subscriber::EnvFilter;

#[derive(Debug, PartialEq, Eq)]
enum CliMode {
    Sync { include_states: bool },
    Status,
    Logout,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Sync {
        include_states: false,
    };
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--states" => {
                mode = CliMode::Sync {
                    include_states: true,
                }
            }
            "--status" => mode = CliMode::Status,
            "--logout" => mode = CliMode::Logout,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("savesyncd=info".parse()?))
        .init();

    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        println!("Usage: savesyncd [--states] | --status | --logout");
        println!("  --states   Also sync save states and their previews");
        println!("  --status   Print last sync time, account and local space usage");
        println!("  --logout   Remove stored credentials and exit");
        return Ok(());
    }

    let config = SyncConfig::from_env()?;
    if mode == CliMode::Logout {
        if CredentialsStore::new(&config.credentials_file).delete()? {
            tracing::info!("stored credentials removed");
        } else {
            tracing::info!("no stored credentials");
        }
        return Ok(());
    }

    let session = DriveSession::from_config(&config)?;
    let coordinator = Arc::new(SyncCoordinator::new(
        session,
        config.roots.clone(),
        SyncStateStore::new(&config.state_file),
    ));

    match mode {
        CliMode::Status => {
            println!("{}", coordinator.last_sync_info());
            println!("{}", coordinator.config_info());
            println!("Saves: {}", coordinator.saves_space().await);
            println!("States: {}", coordinator.states_space().await);
        }
        CliMode::Sync { include_states } => {
            let include_states = include_states || config.include_states;
            match coordinator.spawn_sync(include_states).await?? {
                Some(report) => print_report(&report),
                None => println!("No usable session; nothing synced"),
            }
        }
        CliMode::Logout | CliMode::Help => {}
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    for result in &report.categories {
        let name = result.category.remote_name();
        match &result.outcome {
            Ok(category) => {
                println!(
                    "{name}: {} transferred, {} unchanged, {} skipped, {} failed",
                    category.transfers(),
                    category.unchanged(),
                    category.skipped(),
                    category.failures().count()
                );
                for failure in category.failures() {
                    println!("  {}: {:?}", failure.key, failure.status);
                }
            }
            Err(err) => println!("{name}: failed: {err}"),
        }
    }
}
