//! Command-line surface over `trellis_core` services.
//!
//! # Responsibility
//! - Parse arguments into one command.
//! - Load config, start logging, open the database, then dispatch.
//!
//! # Invariants
//! - Every command opens the database through `open_db`, so migrations are
//!   applied before any service runs.
//! - Output is one `key=value` line per fact for easy scripting.

use clap::{ArgGroup, Args, Parser, Subcommand};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use trellis_core::{
    init_from_config, open_db, BulkReorderApplier, CardSortOrder, ConfigError, ContainerRef,
    CoreConfig, DbError, KeySpaceError, LoggingError, NewTemplate, ServiceError,
    TemplateMaterializer, TemplateSnapshot,
};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "trellis", about = "Board maintenance and template tooling", version)]
pub struct Cli {
    /// JSON config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured database path.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print core linkage info.
    Ping,

    /// Rewrite a container's keys with even spacing in current order.
    Renumber(RenumberArgs),

    /// Sort a list's cards by a named criterion.
    #[command(name = "sort-cards")]
    SortCards(SortCardsArgs),

    /// Store a template from a JSON snapshot file.
    #[command(name = "template-import")]
    TemplateImport(TemplateImportArgs),

    /// Store the built-in public templates that are not present yet.
    #[command(name = "seed-templates")]
    SeedTemplates {
        #[arg(long)]
        actor: Uuid,
    },

    /// List templates visible to an actor.
    Templates {
        #[arg(long)]
        actor: Uuid,
    },

    /// Create a new board from a stored template.
    Materialize {
        #[arg(long)]
        template: Uuid,
        #[arg(long)]
        actor: Uuid,
    },
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("container").required(true).args(["board", "list"])))]
pub struct RenumberArgs {
    /// Renumber the lists of this board.
    #[arg(long)]
    pub board: Option<Uuid>,
    /// Renumber the cards of this list.
    #[arg(long)]
    pub list: Option<Uuid>,
    #[arg(long)]
    pub actor: Uuid,
}

impl RenumberArgs {
    fn container(&self) -> Result<ContainerRef, CliError> {
        match (self.board, self.list) {
            (Some(board), None) => Ok(ContainerRef::Board(board)),
            (None, Some(list)) => Ok(ContainerRef::List(list)),
            _ => Err(CliError::Usage(
                "exactly one of --board or --list is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Args)]
pub struct SortCardsArgs {
    #[arg(long)]
    pub list: Uuid,
    /// One of `created_asc`, `created_desc`, `title_asc`.
    #[arg(long, default_value = "created_asc")]
    pub by: String,
    #[arg(long)]
    pub actor: Uuid,
}

#[derive(Debug, Args)]
pub struct TemplateImportArgs {
    /// Snapshot JSON file.
    pub path: PathBuf,
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub actor: Uuid,
    #[arg(long)]
    pub public: bool,
}

#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Db(DbError),
    Service(ServiceError),
    Io { path: PathBuf, source: std::io::Error },
    Usage(String),
}

impl CliError {
    /// Process exit code: 2 for bad input, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) | Self::Config(_) => 2,
            Self::Service(err) if err.code() == "validation_error" => 2,
            _ => 1,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "config error: {err}"),
            Self::Logging(err) => write!(f, "logging error: {err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Service(err) => write!(f, "{}: {err}", err.code()),
            Self::Io { path, source } => write!(f, "cannot read `{}`: {source}", path.display()),
            Self::Usage(message) => write!(f, "usage error: {message}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<KeySpaceError> for CliError {
    fn from(value: KeySpaceError) -> Self {
        Self::Service(value.into())
    }
}

/// Resolves the effective config from the optional file and overrides.
pub fn load_config(cli: &Cli) -> Result<CoreConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::from_path(path)?,
        None => CoreConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
        config.validate()?;
    }
    Ok(config)
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Ping = cli.command {
        println!("trellis_core ping={}", trellis_core::ping());
        println!("trellis_core version={}", trellis_core::core_version());
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_from_config(&config)?;
    let key_space = config.key_space()?;
    let conn = open_db(&config.db_path)?;
    info!(
        "event=cli_start module=cli status=ok db_path={}",
        config.db_path.display()
    );

    match cli.command {
        Commands::Ping => {}
        Commands::Renumber(args) => {
            let container = args.container()?;
            let count = BulkReorderApplier::try_new(&conn)?
                .with_key_space(key_space)
                .renumber_container(container, args.actor)?;
            println!("renumbered={count} container_kind={}", container.kind());
        }
        Commands::SortCards(args) => {
            let order = CardSortOrder::parse(&args.by).ok_or_else(|| {
                CliError::Usage(format!("unknown sort order `{}`", args.by))
            })?;
            let count = BulkReorderApplier::try_new(&conn)?
                .with_key_space(key_space)
                .sort_cards(args.list, order, args.actor)?;
            println!("sorted={count}");
        }
        Commands::TemplateImport(args) => {
            let snapshot = read_snapshot(&args.path)?;
            let template = TemplateMaterializer::try_new(&conn)?
                .with_key_space(key_space)
                .create_template(&NewTemplate {
                    name: args.name,
                    description: args.description,
                    snapshot,
                    is_public: args.public,
                    created_by: args.actor,
                })?;
            println!("template={}", template.template_uuid);
        }
        Commands::SeedTemplates { actor } => {
            let seeded = TemplateMaterializer::try_new(&conn)?
                .with_key_space(key_space)
                .seed_builtin_templates(actor)?;
            for template in &seeded {
                println!("template={} name={:?}", template.template_uuid, template.name);
            }
            println!("seeded={}", seeded.len());
        }
        Commands::Templates { actor } => {
            for template in TemplateMaterializer::try_new(&conn)?.list_templates(actor)? {
                println!(
                    "template={} name={:?} public={}",
                    template.template_uuid, template.name, template.is_public
                );
            }
        }
        Commands::Materialize { template, actor } => {
            let board = TemplateMaterializer::try_new(&conn)?
                .with_key_space(key_space)
                .materialize(template, actor)?;
            println!("board={board}");
        }
    }
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<TemplateSnapshot, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    TemplateSnapshot::from_json(&content).map_err(|err| CliError::Service(err.into()))
}

#[cfg(test)]
mod tests {
    use super::{load_config, run, Cli, CliError, Commands};
    use clap::Parser;
    use std::io::Write;
    use trellis_core::{open_db, BoardService, NewBoard};
    use uuid::Uuid;

    #[test]
    fn renumber_requires_a_container() {
        let actor = Uuid::new_v4().to_string();
        let err = Cli::try_parse_from(["trellis", "renumber", "--actor", &actor]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let board = Uuid::new_v4().to_string();
        let list = Uuid::new_v4().to_string();
        let err = Cli::try_parse_from([
            "trellis", "renumber", "--board", &board, "--list", &list, "--actor", &actor,
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn uuid_arguments_are_parsed() {
        let template = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "trellis",
            "materialize",
            "--template",
            &template.to_string(),
            "--actor",
            &actor.to_string(),
        ])
        .unwrap();
        match cli.command {
            Commands::Materialize {
                template: parsed_template,
                actor: parsed_actor,
            } => {
                assert_eq!(parsed_template, template);
                assert_eq!(parsed_actor, actor);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["trellis", "templates", "--actor", "nope"]).is_err());
    }

    #[test]
    fn db_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("trellis.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(file, r#"{{"db_path": "from-file.db"}}"#).unwrap();

        let cli = Cli::try_parse_from([
            "trellis",
            "--config",
            config_path.to_str().unwrap(),
            "--db",
            "override.db",
            "ping",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.db_path.to_str(), Some("override.db"));
    }

    #[test]
    fn import_then_materialize_creates_board() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("boards.db");
        let snapshot_path = dir.path().join("kanban.json");
        std::fs::write(
            &snapshot_path,
            r#"{"title": "Kanban", "lists": [{"title": "To Do", "cards": [{"title": "Plan"}]}]}"#,
        )
        .unwrap();
        let actor = Uuid::new_v4();

        run(Cli::try_parse_from([
            "trellis",
            "--db",
            db_path.to_str().unwrap(),
            "template-import",
            snapshot_path.to_str().unwrap(),
            "--name",
            "Sprint",
            "--actor",
            &actor.to_string(),
        ])
        .unwrap())
        .unwrap();

        let conn = open_db(&db_path).unwrap();
        let template = trellis_core::TemplateMaterializer::try_new(&conn)
            .unwrap()
            .list_templates(actor)
            .unwrap()
            .remove(0);
        drop(conn);

        run(Cli {
            config: None,
            db: Some(db_path.clone()),
            command: Commands::Materialize {
                template: template.template_uuid,
                actor,
            },
        })
        .unwrap();

        let conn = open_db(&db_path).unwrap();
        let boards: i64 = conn
            .query_row("SELECT COUNT(*) FROM boards;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(boards, 1);
    }

    #[test]
    fn seed_templates_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("boards.db");
        let actor = Uuid::new_v4().to_string();
        for _ in 0..2 {
            run(Cli::try_parse_from([
                "trellis",
                "--db",
                db_path.to_str().unwrap(),
                "seed-templates",
                "--actor",
                &actor,
            ])
            .unwrap())
            .unwrap();
        }

        let conn = open_db(&db_path).unwrap();
        let templates: i64 = conn
            .query_row("SELECT COUNT(*) FROM board_templates;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(templates, trellis_core::BUILTIN_TEMPLATES.len() as i64);
    }

    #[test]
    fn renumber_by_non_admin_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("boards.db");
        let owner = Uuid::new_v4();
        let board = {
            let conn = open_db(&db_path).unwrap();
            BoardService::try_new(&conn)
                .unwrap()
                .create_board(&NewBoard::new("Sprint", owner))
                .unwrap()
                .board_uuid
        };

        let err = run(Cli {
            config: None,
            db: Some(db_path),
            command: Commands::Renumber(super::RenumberArgs {
                board: Some(board),
                list: None,
                actor: Uuid::new_v4(),
            }),
        })
        .unwrap_err();
        assert!(matches!(err, CliError::Service(ref inner) if inner.code() == "permission_denied"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn unknown_sort_order_is_a_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(Cli {
            config: None,
            db: Some(dir.path().join("boards.db")),
            command: Commands::SortCards(super::SortCardsArgs {
                list: Uuid::new_v4(),
                by: "random".to_string(),
                actor: Uuid::new_v4(),
            }),
        })
        .unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
