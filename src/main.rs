use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use bmad_dash_core::prompts::{self, PromptCategory};
use bmad_dash_core::validation::gap_headline;
use bmad_dash_core::{
    ChatError, ChatSession, ChatSidebar, Config, DashboardClient, EvidenceStatus, GapSeverity,
    PanelState, ProjectContext, StoryPanel, SyncBanner,
};

#[derive(Parser)]
#[command(name = "bmad-dash")]
#[command(about = "Terminal client for the BMAD Dash coach and story evidence")]
struct Cli {
    /// Backend URL (overrides config and BMAD_DASH_URL)
    #[arg(long, global = true)]
    url: Option<String>,
    /// Project root sent to the backend
    #[arg(long, global = true)]
    project_root: Option<String>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the coach a question and stream the answer
    Chat {
        /// Your question
        message: String,
        /// Project context as a JSON file
        #[arg(short, long)]
        context: Option<PathBuf>,
        /// Write the rendered conversation to an HTML file
        #[arg(long)]
        html: Option<PathBuf>,
        /// Stop reading the reply at the first error frame
        #[arg(long)]
        stop_on_error: bool,
    },
    /// Suggested prompts for a story status
    Prompts {
        /// Project context as a JSON file
        #[arg(short, long)]
        context: Option<PathBuf>,
        /// Only show one category
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },
    /// Git, test and review badges for a story
    Evidence {
        story_id: String,
    },
    /// Show a story with its tasks
    Story {
        story_id: String,
    },
    /// Ask the backend to re-read the project
    Refresh,
    /// BMAD documentation sync
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Stories that skipped a workflow step
    Gaps,
    /// Completion checks for a story
    Validate {
        story_id: String,
    },
    /// Show the backend's story cache
    Cache {
        /// Drop the cache and re-read the project first
        #[arg(long)]
        clear: bool,
    },
    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Save the backend URL
    SetUrl { url: String },
    /// Save the project root
    SetRoot { path: String },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Show the sync banner
    Status,
    /// Check the docs site for a newer version now
    Check,
    /// Download the latest docs into the project
    Perform,
    /// Mark the latest docs as seen
    Dismiss,
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Workflow,
    Info,
    Validation,
    Help,
}

impl From<CategoryArg> for PromptCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Workflow => PromptCategory::Workflow,
            CategoryArg::Info => PromptCategory::Info,
            CategoryArg::Validation => PromptCategory::Validation,
            CategoryArg::Help => PromptCategory::Help,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load()?;
    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }
    if let Some(root) = &cli.project_root {
        config.project_root = Some(root.clone());
    }
    debug!(
        base_url = %config.base_url,
        project_root = ?config.project_root,
        stop_on_stream_error = config.stop_on_stream_error,
        "effective config"
    );

    match cli.command {
        Commands::Chat { message, context, html, stop_on_error } => {
            config.stop_on_stream_error |= stop_on_error;
            chat(&config, &message, context.as_deref(), html.as_deref()).await?
        }
        Commands::Prompts { context, category } => show_prompts(context.as_deref(), category)?,
        Commands::Evidence { story_id } => show_evidence(&config, &story_id).await?,
        Commands::Story { story_id } => show_story(&config, &story_id).await?,
        Commands::Refresh => refresh(&config).await?,
        Commands::Sync { action } => sync(&config, action).await?,
        Commands::Gaps => show_gaps(&config).await?,
        Commands::Validate { story_id } => validate(&config, &story_id).await?,
        Commands::Cache { clear } => show_cache(&config, clear).await?,
        Commands::Config { action } => configure(&config, action)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_context(path: Option<&Path>) -> Result<ProjectContext> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading context file {}", path.display()))?;
            Ok(serde_json::from_str(&content)?)
        }
        None => Ok(ProjectContext::default()),
    }
}

fn dashboard_client(config: &Config) -> Result<DashboardClient> {
    Ok(DashboardClient::new(&config.base_url, &config.project_root_or_cwd()?))
}

/// Token cancelled on Ctrl-C
fn ctrl_c_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted, cancelling request");
            trigger.cancel();
        }
    });
    cancel
}

async fn chat(config: &Config, message: &str, context: Option<&Path>, html: Option<&Path>) -> Result<()> {
    let session = match config.connect_timeout() {
        Some(timeout) => ChatSession::with_connect_timeout(&config.base_url, timeout)?,
        None => ChatSession::new(&config.base_url),
    }
    .with_error_policy(config.error_policy());

    let mut sidebar = ChatSidebar::new(session);
    sidebar.set_project_context(load_context(context)?);

    println!("🤖 {}\n", "BMAD Coach".bold().magenta());
    let cancel = ctrl_c_token();
    let mut stdout = std::io::stdout();
    let result = sidebar
        .submit_with(message, &cancel, |token| {
            print!("{}", token);
            stdout.flush().ok();
        })
        .await;
    println!();

    match result {
        Ok(Some(_)) => {}
        Ok(None) => println!("{}", "Nothing to send".yellow()),
        Err(ChatError::Cancelled) => println!("{}", "Cancelled".yellow()),
        Err(ChatError::EmptyMessage) => println!("{}", "Nothing to send".yellow()),
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            if e.status_code().is_none() {
                println!("Make sure the dashboard is running at {}", config.base_url.bold());
            }
        }
    }

    if let Some(path) = html {
        fs::write(path, sidebar.view().to_document("BMAD Coach"))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{} {}", "Transcript saved to".dimmed(), path.display());
    }

    Ok(())
}

fn show_prompts(context: Option<&Path>, category: Option<CategoryArg>) -> Result<()> {
    let context = load_context(context)?;
    let mut suggestions = prompts::generate(&context);
    if let Some(category) = category {
        suggestions = prompts::filter_by_category(&suggestions, category.into());
    }

    println!(
        "\n{} {}",
        "💡 Suggested prompts for".bold().blue(),
        context.story_status.bold()
    );
    println!("{}", "=".repeat(40).dimmed());
    for prompt in suggestions {
        println!("  {} {} {}", prompt.icon, prompt.text, format!("[{}]", prompt.category.as_str()).dimmed());
    }

    Ok(())
}

fn paint(label: &str, status: EvidenceStatus) -> ColoredString {
    match status {
        EvidenceStatus::Green => label.green(),
        EvidenceStatus::Yellow => label.yellow(),
        EvidenceStatus::Red => label.red(),
        EvidenceStatus::Unknown => label.dimmed(),
    }
}

async fn show_evidence(config: &Config, story_id: &str) -> Result<()> {
    let client = dashboard_client(config)?;
    let summary = client.get_evidence(story_id, &ctrl_c_token()).await;

    println!("\n{} {}", "🧾 Evidence for story".bold().blue(), story_id.bold());
    println!("{}", "=".repeat(30).dimmed());

    let git_status = summary.git.as_ref().map_or(EvidenceStatus::Unknown, |g| g.status);
    let test_status = summary.tests.as_ref().map_or(EvidenceStatus::Unknown, |t| t.status);
    println!("  {}", paint(&summary.git_label(), git_status));
    println!("  {}", paint(&summary.test_label(), test_status));
    if summary.is_reviewed() {
        println!("  {}", "Reviewed".green());
    } else if summary.review.is_some() {
        println!("  {}", "Review pending".yellow());
    }

    if let Some(git) = &summary.git {
        for commit in &git.commits {
            let sha: String = commit.sha.chars().take(7).collect();
            println!("    • {} {}", sha.yellow(), commit.message);
        }
    }

    Ok(())
}

async fn show_story(config: &Config, story_id: &str) -> Result<()> {
    let mut panel = StoryPanel::new(dashboard_client(config)?);
    let load = panel.begin_open(story_id);
    let cancel = ctrl_c_token();
    let result = tokio::select! {
        result = load.fetch() => result,
        _ = cancel.cancelled() => {
            panel.close();
            return Ok(());
        }
    };
    panel.apply(&load, result);

    match panel.state() {
        PanelState::Loaded(story) => {
            println!("\n{} {}", story.story_id.bold().yellow(), story.title.bold());
            println!("Status: {}", story.status.cyan());
            if !story.tasks.is_empty() {
                println!("\n{}", "Tasks".bold());
                for task in &story.tasks {
                    let mark = if task.status == "done" { "✓".green() } else { "○".dimmed() };
                    let inferred = if task.inferred { " (inferred)".dimmed() } else { "".normal() };
                    println!("  {} {}{}", mark, task.title, inferred);
                }
            }
            if let Some(body) = story.body() {
                println!("\n{}", body);
            }
        }
        PanelState::Failed(message) => println!("{}: {}", "Error loading story".red(), message),
        PanelState::Loading(_) | PanelState::Closed => {}
    }

    Ok(())
}

async fn refresh(config: &Config) -> Result<()> {
    let client = dashboard_client(config)?;
    let response = client.refresh(&ctrl_c_token()).await?;
    let status = response
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("ok");
    println!("🔄 Refresh: {}", status.green());
    Ok(())
}

async fn sync(config: &Config, action: SyncAction) -> Result<()> {
    let mut banner = SyncBanner::new(dashboard_client(config)?);
    let cancel = ctrl_c_token();
    banner.open(&cancel).await?;

    match action {
        SyncAction::Status => {}
        SyncAction::Check => {
            let check = banner.force_check(&cancel).await?;
            if let Some(error) = check.error {
                println!("{}: {}", "Update check failed".yellow(), error);
            }
        }
        SyncAction::Perform => {
            println!("{}", "⏳ Syncing BMAD documentation...".dimmed());
            let outcome = banner.sync(&cancel).await?;
            println!(
                "{}",
                outcome
                    .message
                    .as_deref()
                    .unwrap_or("BMAD Documentation successfully synced to local _bmad folder.")
                    .green()
            );
        }
        SyncAction::Dismiss => {
            banner.dismiss(&cancel).await?;
        }
    }

    if let (Some(headline), Some(detail)) = (banner.headline(), banner.detail()) {
        let headline = if banner.update_available() {
            headline.bold().yellow()
        } else {
            headline.bold().green()
        };
        println!("\n📚 {}", headline);
        println!("   {}", detail);
        if let Some(status) = banner.status() {
            println!("   {} {}", "Docs:".dimmed(), status.docs_url());
        }
    }
    banner.close();
    Ok(())
}

async fn show_gaps(config: &Config) -> Result<()> {
    let client = dashboard_client(config)?;
    let stories = client.get_workflow_gaps(&ctrl_c_token()).await?;

    let Some(headline) = gap_headline(&stories) else {
        println!("{}", "✅ No workflow gaps".green());
        return Ok(());
    };

    println!("\n{}", format!("⚠️  {}", headline).bold().yellow());
    println!("{}", "=".repeat(40).dimmed());
    for story in &stories {
        println!("\n{} {} {}", story.story_id.bold(), story.story_title, format!("[{}]", story.story_status).dimmed());
        for gap in &story.gaps {
            let text = match gap.severity {
                GapSeverity::High => gap.text().red(),
                GapSeverity::Medium => gap.text().yellow(),
                GapSeverity::Low => gap.text().normal(),
            };
            println!("  • {}", text);
            if let Some(command) = &gap.suggested_command {
                println!("    {} {}", "Run:".dimmed(), command.cyan());
            }
        }
    }
    Ok(())
}

async fn validate(config: &Config, story_id: &str) -> Result<()> {
    let client = dashboard_client(config)?;
    let result = client.validate_story(story_id, &ctrl_c_token()).await?;

    let verdict = if result.is_complete { "Complete".green() } else { "Incomplete".yellow() };
    println!("\n{} {}: {}", "🔍 Story".bold().blue(), result.story_id.bold(), verdict);
    println!("{}", "=".repeat(30).dimmed());

    let check = |ok: bool| if ok { "✓".green() } else { "✗".red() };
    println!("  {} Git commits ({})", check(result.has_git_commits), result.git_commit_count);
    println!(
        "  {} Tests ({} passed, {} failed)",
        check(result.has_tests && result.test_fail_count == 0),
        result.test_pass_count,
        result.test_fail_count
    );
    println!("  {} All tasks complete", check(result.all_tasks_complete));
    println!("  {} dev-story workflow", check(result.has_dev_story_workflow));
    println!("  {} code-review workflow", check(result.has_code_review_workflow));

    if !result.issues.is_empty() {
        println!("\n{}", "Issues".bold());
        for issue in &result.issues {
            println!("  • {}", issue);
        }
    }
    Ok(())
}

async fn show_cache(config: &Config, clear: bool) -> Result<()> {
    let client = dashboard_client(config)?;
    let cancel = ctrl_c_token();
    if clear {
        client.refresh(&cancel).await?;
        println!("{}", "🗑️  Cache cleared".green());
    }

    match client.get_cache_status(&cancel).await? {
        Some(cache) if cache.cache_file_exists => {
            println!("💾 {} {}", cache.summary().green(), format!("(updated {})", cache.age_label()).dimmed());
            for (status, count) in &cache.status_counts {
                println!("  {:<14} {}", status, count);
            }
        }
        Some(cache) => println!("💾 {}", cache.summary().dimmed()),
        None => println!("{}", "The backend did not report a cache".dimmed()),
    }
    Ok(())
}

fn configure(effective: &Config, action: ConfigAction) -> Result<()> {
    let path = Config::get_config_path()?;
    // Overrides from the environment and flags are not persisted
    let mut config = Config::load_from(&path)?;
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(effective)?);
            println!("{} {}", "Saved at".dimmed(), path.display());
        }
        ConfigAction::SetUrl { url } => {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow!("URL must start with http:// or https://"));
            }
            config.base_url = url;
            config.save_to(&path)?;
            println!("{} {}", "Backend URL set to".green(), config.base_url.bold());
        }
        ConfigAction::SetRoot { path: root } => {
            config.project_root = Some(root);
            config.save_to(&path)?;
            println!("{}", "Project root saved".green());
        }
    }
    Ok(())
}
