mod commands;
mod output;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use forum_db::{CategoryId, ForumConfig, ForumDb, SearchSort};
use miette::Result;
use tracing::info;

#[derive(Parser)]
#[command(name = "forum-cli")]
#[command(about = "Operate forum storage: categories, integrity checks and backups")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Data directory (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and config store
    Init,
    /// Category management
    Category {
        #[command(subcommand)]
        cmd: CategoryCommands,
    },
    /// Check every partition's schema, search index and placement
    Verify {
        /// Reinstall missing triggers and rebuild broken indexes
        #[arg(long)]
        repair: bool,
    },
    /// Show forum-wide and per-category statistics
    Stats,
    /// Search posts
    Search {
        query: String,

        /// Restrict to one category
        #[arg(long)]
        category: Option<i64>,

        /// relevance, created_at or view_count
        #[arg(long, default_value = "relevance")]
        sort: SearchSort,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Copy the config store and every active partition into a directory
    Backup { dir: PathBuf },
    /// Rebuild the search index from stored posts
    RebuildIndex {
        /// Only this category (defaults to all active categories)
        #[arg(long)]
        category: Option<i64>,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories with their activity
    List {
        /// Include deactivated categories
        #[arg(long)]
        all: bool,
    },
    /// Create a category and its partition
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value_t = 0)]
        order: i64,
    },
    /// Hide a category without touching its partition
    Deactivate { id: i64 },
    /// Make a deactivated category visible again
    Activate { id: i64 },
    /// Delete an empty category and its partition file
    Delete { id: i64 },
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("forum").join("forum.toml"))
}

fn load_config(explicit: Option<&Path>, data_dir: Option<&Path>) -> Result<ForumConfig> {
    let mut config = match explicit {
        Some(path) => {
            info!("Loading config from: {:?}", path);
            ForumConfig::load(path)?
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                info!("Loading config from: {:?}", path);
                ForumConfig::load(&path)?
            }
            None => ForumConfig::default(),
        },
    };

    if let Some(dir) = data_dir {
        config.database.path = dir.to_path_buf();
    }
    Ok(config)
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("forum_db=debug,forum_cli=debug,info")
        } else {
            EnvFilter::new("forum_db=info,forum_cli=info,warn")
        }
    });

    let terminal_layer = if debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .with_cause_chain()
                .context_lines(3)
                .build(),
        )
    }))?;
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(cli.config.as_deref(), cli.data_dir.as_deref())?;
    let db = ForumDb::open(&config.database).await?;

    let result = match cli.command {
        Commands::Init => commands::maintenance::init(&db).await,
        Commands::Category { cmd } => match cmd {
            CategoryCommands::List { all } => commands::category::list(&db, all).await,
            CategoryCommands::Create {
                name,
                description,
                order,
            } => commands::category::create(&db, &name, description, order).await,
            CategoryCommands::Deactivate { id } => {
                commands::category::set_active(&db, CategoryId::new(id), false).await
            }
            CategoryCommands::Activate { id } => {
                commands::category::set_active(&db, CategoryId::new(id), true).await
            }
            CategoryCommands::Delete { id } => {
                commands::category::delete(&db, CategoryId::new(id)).await
            }
        },
        Commands::Verify { repair } => commands::maintenance::verify(&db, repair).await,
        Commands::Stats => commands::stats::stats(&db).await,
        Commands::Search {
            query,
            category,
            sort,
            page,
            page_size,
        } => {
            commands::stats::search(&db, &query, category.map(CategoryId::new), sort, page, page_size)
                .await
        }
        Commands::Backup { dir } => commands::maintenance::backup(&db, &dir).await,
        Commands::RebuildIndex { category } => {
            commands::maintenance::rebuild_index(&db, category.map(CategoryId::new)).await
        }
    };

    db.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_arguments() {
        let cli = Cli::try_parse_from([
            "forum-cli",
            "--data-dir",
            "/tmp/forum",
            "search",
            "rust async",
            "--category",
            "3",
            "--sort",
            "view_count",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/forum")));
        match cli.command {
            Commands::Search {
                query,
                category,
                sort,
                page,
                page_size,
            } => {
                assert_eq!(query, "rust async");
                assert_eq!(category, Some(3));
                assert_eq!(sort, SearchSort::ViewCount);
                assert_eq!((page, page_size), (1, 20));
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_data_dir_overrides_config() {
        let config = load_config(None, Some(Path::new("/srv/forum"))).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/srv/forum"));
    }
}
