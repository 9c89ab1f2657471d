use anyhow::{ anyhow, bail, Context, Result };
use clap::{ Parser, Subcommand };
use log::warn;
use std::path::{ Path, PathBuf };
use std::sync::Arc;

use vector_console::{
    create_backend,
    ConsoleConfig,
    CreateVectorPage,
    EditPointsPage,
    NotificationCenter,
    NotificationKind,
    Route,
    Shell,
};
use vector_console::schema::{ Confidentiality, FieldDescriptions, SchemaStats };

/// Operator console for the vectorization backend.
#[derive(Parser, Debug)]
#[command(name = "vector-console", version, about = "Vectorize schemas and edit vector point metadata")]
struct Cli {
    /// Backend base URL for this run (overrides the saved configuration).
    #[arg(long, global = true)]
    backend_url: Option<String>,
    /// Configuration file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print the navigation header before running the command.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read or change the saved configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    #[command(flatten)]
    Page(PageCommand),
}

#[derive(Subcommand, Debug)]
enum PageCommand {
    /// Check that the backend answers.
    Health,
    /// Show the relational schema the backend would vectorize.
    Schema,
    /// Start vectorization into a collection.
    Create {
        collection: String,
        /// Send operator-written field descriptions instead of generating them.
        #[arg(long)]
        manual: bool,
        /// JSON file shaped like {"table": {"field": {"description": "...", "confidentiality": 5}}}.
        #[arg(long, requires = "manual")]
        descriptions: Option<PathBuf>,
        /// Leave a table out of the request entirely. Repeatable.
        #[arg(long = "exclude", requires = "manual")]
        exclude: Vec<String>,
    },
    /// List stored points grouped by collection.
    Points {
        /// Only show this collection.
        #[arg(long)]
        collection: Option<String>,
    },
    /// Edit one field of one point and save it.
    UpdatePoint {
        id: String,
        field: String,
        #[arg(long)]
        description: Option<String>,
        /// 1 (public) to 10 (most sensitive); out-of-range values are clamped.
        #[arg(long)]
        confidentiality: Option<Confidentiality>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the saved settings, without environment or command-line overrides.
    Show,
    SetUrl { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(ConsoleConfig::default_path);

    match cli.command {
        Commands::Config { action } => run_config(&action, &config_path),
        Commands::Page(command) => {
            let mut config = ConsoleConfig::load(&config_path)
                .with_context(|| format!("loading configuration from {}", config_path.display()))?;
            if let Some(url) = &cli.backend_url {
                config.set_backend_url(url)?;
            }
            run_page(command, &config, cli.verbose).await
        }
    }
}

async fn run_page(command: PageCommand, config: &ConsoleConfig, verbose: bool) -> Result<()> {
    let connect = || create_backend(config.backend_config());
    let notifications = Arc::new(NotificationCenter::new(config.notification_duration()));
    let mut shell = Shell::new();

    match command {
        PageCommand::Health => {
            shell.activate(Route::CreateVector);
            print_header(&shell, verbose);
            let page = CreateVectorPage::new(connect()?, notifications.clone());
            let _ = page.check_connection().await;
        }
        PageCommand::Schema => {
            shell.activate(Route::CreateVector);
            print_header(&shell, verbose);
            let page = CreateVectorPage::new(connect()?, notifications.clone());
            if page.set_manual_input(true).await.is_ok() {
                if let Some(schema) = page.schema() {
                    for (table, fields) in &schema {
                        println!("{} ({} fields)", table, fields.len());
                        for field in fields {
                            println!("    {}", field);
                        }
                    }
                    print_stats(page.stats());
                }
            }
        }
        PageCommand::Create { collection, manual, descriptions, exclude } => {
            shell.activate(Route::CreateVector);
            print_header(&shell, verbose);
            let page = CreateVectorPage::new(connect()?, notifications.clone());
            page.set_collection_name(collection);
            if manual {
                if page.set_manual_input(true).await.is_err() {
                    return finish(&notifications);
                }
                if let Some(path) = descriptions {
                    apply_descriptions(&page, &path)?;
                }
                for table in exclude {
                    if page.schema().is_some_and(|schema| schema.contains_key(&table)) {
                        if !page.is_table_excluded(&table) {
                            page.toggle_table_exclusion(&table);
                        }
                    } else {
                        warn!("Cannot exclude unknown table '{}'", table);
                    }
                }
                print_stats(page.stats());
            }
            let _ = page.submit().await;
        }
        PageCommand::Points { collection } => {
            shell.activate(Route::EditPoints);
            print_header(&shell, verbose);
            let page = EditPointsPage::new(connect()?, notifications.clone());
            if page.load_points().await.is_ok() {
                let groups = page.groups();
                if groups.is_empty() {
                    println!("No points stored.");
                }
                for group in groups.iter().filter(|g| collection.as_deref().map_or(true, |c| c == g.name)) {
                    println!("{} ({})", group.name, group.count());
                    for point in &group.points {
                        println!("  {}  {}", point.id, point.metadata.table_name);
                        for (field, meta) in &point.metadata.value {
                            println!("      {:<24} [{:>2}] {}", field, meta.confidentiality.get(), meta.description);
                        }
                    }
                }
            }
        }
        PageCommand::UpdatePoint { id, field, description, confidentiality } => {
            shell.activate(Route::EditPoints);
            print_header(&shell, verbose);
            if description.is_none() && confidentiality.is_none() {
                bail!("nothing to change: pass --description and/or --confidentiality");
            }
            let page = EditPointsPage::new(connect()?, notifications.clone());
            if page.load_points().await.is_err() {
                return finish(&notifications);
            }
            edit_point_field(&page, &id, &field, description.as_deref(), confidentiality)?;
            let _ = page.save_point(&id).await;
        }
    }

    finish(&notifications)
}

fn edit_point_field(
    page: &EditPointsPage,
    id: &str,
    field: &str,
    description: Option<&str>,
    confidentiality: Option<Confidentiality>
) -> Result<()> {
    if page.draft(id).is_none() {
        bail!("point '{}' not found", id);
    }
    if let Some(text) = description {
        if !page.update_description(id, field, text) {
            bail!("point '{}' has no field '{}'", id, field);
        }
    }
    if let Some(value) = confidentiality {
        if !page.update_confidentiality(id, field, value) {
            bail!("point '{}' has no field '{}'", id, field);
        }
    }
    Ok(())
}

fn run_config(action: &ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => print!("{}", render_saved_config(path)?),
        ConfigAction::SetUrl { url } => {
            let config = save_backend_url(path, url)?;
            println!("Backend url set to {}", config.backend_url);
        }
    }
    Ok(())
}

fn render_saved_config(path: &Path) -> Result<String> {
    let config = ConsoleConfig::load_file(path)
        .with_context(|| format!("reading configuration from {}", path.display()))?;
    Ok(format!("# {}\n{}", path.display(), toml::to_string_pretty(&config)?))
}

/// Persists a new backend URL. An unreadable file is replaced so a broken
/// configuration can always be repaired from the command line.
fn save_backend_url(path: &Path, url: &str) -> Result<ConsoleConfig> {
    let mut config = ConsoleConfig::load_file(path).unwrap_or_else(|e| {
        warn!("Replacing unreadable configuration at {}: {}", path.display(), e);
        ConsoleConfig::default()
    });
    config.set_backend_url(url)?;
    config.save(path)?;
    Ok(config)
}

fn apply_descriptions(page: &CreateVectorPage, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading descriptions from {}", path.display()))?;
    let provided: FieldDescriptions = serde_json::from_str(&text)
        .with_context(|| format!("parsing descriptions in {}", path.display()))?;

    for (table, fields) in provided {
        for (field, meta) in fields {
            if page.update_description(&table, &field, &meta.description) {
                page.update_confidentiality(&table, &field, meta.confidentiality);
            } else {
                warn!("Skipping '{}.{}': not in the backend schema", table, field);
            }
        }
    }
    Ok(())
}

fn print_header(shell: &Shell, verbose: bool) {
    if verbose {
        println!("{}\n", shell.render_nav());
    }
}

fn print_stats(stats: SchemaStats) {
    println!("Tables: {} total, {} active, {} excluded", stats.total, stats.active, stats.excluded);
}

/// Prints the last notification; an error notification fails the process.
fn finish(notifications: &NotificationCenter) -> Result<()> {
    match notifications.dismiss() {
        Some(n) if n.kind == NotificationKind::Error => Err(anyhow!(n.message)),
        Some(n) => {
            println!("{}", n.message);
            Ok(())
        }
        None => Ok(()),
    }
}
