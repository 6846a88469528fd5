use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use log::{error, warn, LevelFilter};

use coconut_guardian::{
    analysis::{BackendKind, ImageSubmission},
    models::Language,
    pipeline::RefreshOutcome,
    settings::{self, SettingsStore},
    utils::logging::init_logging,
    AppState,
};

const MIRROR_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "coconut-guardian", version, about = "Analyze a coconut leaf photo")]
struct Cli {
    /// Photo to analyze
    image: Option<PathBuf>,

    /// Classification backend (remote-vision | custom-model)
    #[arg(long, value_parser = parse_backend)]
    backend: Option<BackendKind>,

    /// Display language code (en, kn, ta, te, ml)
    #[arg(long)]
    lang: Option<String>,

    /// Switch to this language after the analysis and refresh the treatment
    #[arg(long)]
    relang: Option<String>,

    /// Remember the chosen backend and final language in the settings file
    #[arg(long)]
    save: bool,

    /// Settings file
    #[arg(long, env = "COCONUT_GUARDIAN_SETTINGS", default_value = "coconut-guardian.json")]
    settings: PathBuf,
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    BackendKind::parse(value).ok_or_else(|| format!("unknown backend '{value}'"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(if settings::debug_enabled() {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let store = SettingsStore::new(cli.settings.clone())?;
    let mut settings = store.effective();
    if let Some(code) = &cli.lang {
        settings.language = Language::from_code(code);
    }

    let state = AppState::from_settings(&settings).await?;
    if let Some(backend) = cli.backend {
        state.context.set_backend(backend);
    }

    // An unreadable or empty file is reported like a missing selection.
    let image = match &cli.image {
        Some(path) => match ImageSubmission::from_path(path).await {
            Ok(image) => image,
            Err(err) => {
                error!("{err:#}");
                None
            }
        },
        None => None,
    };

    let outcome = match state.orchestrator.submit_current(image.as_ref()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("{}", err.user_message());
            return Ok(ExitCode::from(1));
        }
    };

    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning.user_message());
    }

    if let Some(code) = &cli.relang {
        if let Some(task) = state.reactor.change_language(Language::from_code(code)) {
            if let RefreshOutcome::Failed(err) = task.await? {
                eprintln!("warning: {}", err.user_message());
            }
        }
    }

    let record = state
        .history
        .get(&outcome.record.id)
        .unwrap_or(outcome.record);
    println!("{}", serde_json::to_string_pretty(&record)?);

    if cli.save {
        store.update_backend(state.context.backend())?;
        store.update_language(state.context.language())?;
    }

    let unfinished = state.history.flush_mirrors(MIRROR_FLUSH_TIMEOUT).await;
    if unfinished > 0 {
        warn!("{unfinished} mirror task(s) still running at exit");
    }

    Ok(ExitCode::SUCCESS)
}
