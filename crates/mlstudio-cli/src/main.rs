//! mlstudio CLI: the experiment wizard, one page per subcommand.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use indicatif::ProgressBar;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mlstudio::client::HttpService;
use mlstudio::history::{HistoryView, NO_HISTORY};
use mlstudio::intake::check_file_name;
use mlstudio::presenter::NO_RESULTS;
use mlstudio::workflow::resolve;
use mlstudio::{
    Activation, ClientConfig, Configurator, FileStore, HistoryViewer, Intake, ResultsView, Route,
    Session, TaskType, UploadFile, WorkflowEvent, WorkflowState,
};

#[derive(Parser)]
#[command(
    name = "mlstudio",
    about = "🧪 mlstudio: upload a dataset, train a model and inspect the result",
    version,
    author
)]
struct Cli {
    /// YAML config file (api_url, profile_dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Base URL of the training API
    #[arg(long, global = true, env = "MLSTUDIO_API_URL")]
    api_url: Option<String>,
    /// Profile directory holding the session
    #[arg(long, global = true, env = "MLSTUDIO_PROFILE")]
    profile: Option<PathBuf>,
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a CSV dataset
    Upload {
        /// Path to the CSV file
        file: PathBuf,
    },
    /// Show the experiment form for the current dataset
    Configure,
    /// Train a model on the current dataset
    Train {
        /// Classification, Regression or Clustering
        #[arg(long, short)]
        task: Option<String>,
        /// Model from the task's catalog
        #[arg(long, short)]
        model: Option<String>,
        /// Target column (supervised tasks only)
        #[arg(long)]
        target: Option<String>,
        /// Held-out fraction, 0.1 to 0.5
        #[arg(long)]
        test_size: Option<f64>,
        /// Disable feature scaling
        #[arg(long)]
        no_scaling: bool,
    },
    /// Show the latest training result
    Results {
        /// Write each plot as a PNG into this directory
        #[arg(long)]
        export_plots: Option<PathBuf>,
    },
    /// List past experiments
    History,
    /// Show where the wizard stands
    Status,
    /// Forget the current dataset and result
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = load_config(&cli)?;
    debug!(api_url = %config.api_url, profile = %config.profile_dir.display(), "loaded config");
    let session = Session::new(FileStore::open(&config.profile_dir)?);
    let service = HttpService::new(config)?;

    let requested = match &cli.command {
        Commands::Upload { .. } => Some(Route::Intake),
        Commands::Configure | Commands::Train { .. } => Some(Route::Configure),
        Commands::Results { .. } => Some(Route::Results),
        Commands::History => Some(Route::History),
        Commands::Status | Commands::Reset => None,
    };
    if let Some(requested) = requested {
        let landed = resolve(requested, &session)?;
        if landed != requested {
            return redirect(landed);
        }
    }

    match cli.command {
        Commands::Upload { file } => cmd_upload(&session, &service, file).await?,
        Commands::Configure => cmd_configure(&session, &service)?,
        Commands::Train {
            task,
            model,
            target,
            test_size,
            no_scaling,
        } => {
            let options = TrainOptions {
                task,
                model,
                target,
                test_size,
                no_scaling,
            };
            cmd_train(&session, &service, options).await?
        }
        Commands::Results { export_plots } => cmd_results(&session, &service, export_plots)?,
        Commands::History => cmd_history(&service).await?,
        Commands::Status => cmd_status(&session)?,
        Commands::Reset => {
            session.clear()?;
            println!("Session cleared.");
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(profile) = &cli.profile {
        config.profile_dir = profile.clone();
    }
    Ok(config)
}

type FileSession = Session<FileStore>;

// ─── Pages ────────────────────────────────────────────────────────────────────

async fn cmd_upload(session: &FileSession, service: &HttpService, path: PathBuf) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    check_file_name(file_name)?;
    let file = UploadFile::read(&path)?;

    let before = WorkflowState::derive(session)?;
    let intake = Intake::new(session, service);
    let spinner = spinner("Uploading...");
    let dataset = until_interrupted(intake.submit(&file), || intake.deactivate()).await;
    spinner.finish_and_clear();
    let dataset = dataset?;
    let state = before.transition(WorkflowEvent::DatasetUploaded)?;
    debug!(?before, ?state, "dataset stored");

    println!("✓ Uploaded {}", dataset.name);
    if dataset.columns.is_empty() {
        println!("  No column schema was returned.");
    } else {
        println!("  Columns: {}", dataset.columns.join(", "));
    }
    println!();
    println!("Next: {}", hint(state.home()));
    Ok(())
}

fn cmd_configure(session: &FileSession, service: &HttpService) -> Result<()> {
    let page = match Configurator::activate(session, service)? {
        Activation::Ready(page) => page,
        Activation::Redirect(route) => return redirect(route),
    };
    let form = page.form();

    println!("Dataset: {}", form.dataset().name);
    if !form.dataset().columns.is_empty() {
        println!("Columns: {}", form.dataset().columns.join(", "));
    }
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Task", "Models", "Target"]);
    for task in TaskType::ALL {
        table.add_row([
            task.as_str().to_string(),
            task.models().join(", "),
            if task.is_supervised() { "required" } else { "-" }.to_string(),
        ]);
    }
    println!("{}", table);

    println!("Defaults:");
    println!("  task:       {}", form.task_type());
    println!("  model:      {}", form.model_name());
    println!("  test size:  {}", form.test_size());
    println!("  scaling:    {}", if form.use_scaling() { "on" } else { "off" });
    println!();
    println!("Next: mlstudio train --task <TASK> --model <MODEL> --target <COLUMN>");
    Ok(())
}

struct TrainOptions {
    task: Option<String>,
    model: Option<String>,
    target: Option<String>,
    test_size: Option<f64>,
    no_scaling: bool,
}

async fn cmd_train(session: &FileSession, service: &HttpService, options: TrainOptions) -> Result<()> {
    let mut page = match Configurator::activate(session, service)? {
        Activation::Ready(page) => page,
        Activation::Redirect(route) => return redirect(route),
    };

    let form = page.form_mut();
    if let Some(task) = &options.task {
        form.set_task_type(task.parse()?);
    }
    if let Some(model) = &options.model {
        form.set_model(model)?;
    }
    if let Some(target) = options.target {
        form.set_target_column(target);
    }
    if let Some(test_size) = options.test_size {
        form.set_test_size(test_size)?;
    }
    if options.no_scaling {
        form.set_use_scaling(false);
    }
    form.validate()?;

    let training = WorkflowState::derive(session)?.transition(WorkflowEvent::TrainingStarted)?;
    debug!(state = ?training, "submitting experiment");

    let spinner = spinner("Training...");
    let outcome = until_interrupted(page.submit(), || page.deactivate()).await;
    spinner.finish_and_clear();

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            let state = training.transition(WorkflowEvent::TrainingFailed)?;
            eprintln!("Next: {}", hint(state.home()));
            return Err(e);
        }
    };
    let state = training.transition(WorkflowEvent::TrainingSucceeded)?;

    println!("✓ Trained {}", result.model_name);
    println!();
    println!("Next: {}", hint(state.home()));
    Ok(())
}

fn cmd_results(session: &FileSession, service: &HttpService, export: Option<PathBuf>) -> Result<()> {
    let page = match ResultsView::load(session, service)? {
        ResultsView::Ready(page) => page,
        ResultsView::Missing => {
            println!("{}", NO_RESULTS);
            let (label, route) = ResultsView::missing_action();
            println!("{}: mlstudio {}", label, route.as_str());
            return Ok(());
        }
    };

    println!("Model: {}", page.model_name);
    println!();

    if !page.metrics.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["Metric", "Value"]);
        for card in &page.metrics {
            table.add_row([card.label.as_str(), card.value.as_str()]);
        }
        println!("{}", table);
    }

    println!("── Explanation ─────────────────────────");
    println!("{}", page.explanation.trim());
    println!();

    if !page.plots.is_empty() {
        println!("── Plots ({}) ───────────────────────────", page.plots.len());
        for plot in &page.plots {
            println!("  {}", plot.title);
        }
    }

    if let Some(url) = &page.download_url {
        println!("Download model: {}", url);
    }

    if let Some(dir) = export {
        let written = page.export_plots(&dir)?;
        println!("Exported {} plot(s) to {}", written.len(), dir.display());
    }
    Ok(())
}

async fn cmd_history(service: &HttpService) -> Result<()> {
    let viewer = HistoryViewer::new(service);
    let spinner = spinner("Loading history...");
    let view = until_interrupted(viewer.list(), || viewer.deactivate()).await;
    spinner.finish_and_clear();

    match view? {
        HistoryView::Empty => println!("{}", NO_HISTORY),
        HistoryView::Entries(rows) => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["ID", "Model", "Task", "Dataset", "Metric", "Created"]);
            for row in &rows {
                table.add_row([
                    row.id.as_str(),
                    row.model_name.as_str(),
                    row.task_type.as_str(),
                    row.dataset_name.as_str(),
                    row.headline.as_str(),
                    row.created_at.as_str(),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn cmd_status(session: &FileSession) -> Result<()> {
    let state = WorkflowState::derive(session)?;
    let dataset = session.dataset()?;
    let result = session.training_result()?;

    println!("State:   {}", state_label(state));
    println!(
        "Dataset: {}",
        dataset.as_ref().map(|d| d.name.as_str()).unwrap_or("-")
    );
    println!(
        "Result:  {}",
        result.as_ref().map(|r| r.model_name.as_str()).unwrap_or("-")
    );
    println!();
    println!("Next: {}", hint(state.home()));
    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn redirect(route: Route) -> Result<()> {
    println!("No usable dataset in this session.");
    println!("Redirected to {}: {}", route.as_str(), hint(route));
    Ok(())
}

fn hint(route: Route) -> &'static str {
    match route {
        Route::Intake => "mlstudio upload <FILE>",
        Route::Configure => "mlstudio configure",
        Route::Results => "mlstudio results",
        Route::History => "mlstudio history",
    }
}

fn state_label(state: WorkflowState) -> &'static str {
    match state {
        WorkflowState::NeedsDataset => "needs dataset",
        WorkflowState::Configuring => "configuring",
        WorkflowState::Training => "training",
        WorkflowState::HasResult => "has result",
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Runs a page request until it finishes or Ctrl-C leaves the page.
async fn until_interrupted<T>(
    request: impl Future<Output = mlstudio::Result<T>>,
    leave: impl FnOnce(),
) -> Result<T> {
    tokio::select! {
        result = request => Ok(result?),
        _ = tokio::signal::ctrl_c() => {
            leave();
            bail!("Interrupted; the pending request was abandoned.")
        }
    }
}
