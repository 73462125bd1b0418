use crate::ui;
use anyhow::{bail, Context, Result};
use deadfire_order::{
    collections::CollectionData,
    config::AppConfig,
    extension::Extension,
    host::{Host, LocalHost, ModRegistry},
    poe2::{self, GamePaths},
    reorder::{Container, Lists},
};
use serde::Serialize;
use std::{fs, path::PathBuf, sync::Arc, time::Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct GlobalOptions {
    json: bool,
    game_root: Option<PathBuf>,
    user_dir: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum CliAction {
    Ui(GlobalOptions),
    Command {
        command: CliCommand,
        format: OutputFormat,
        options: GlobalOptions,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Paths,
    Order,
    Enable(String),
    Disable(String),
    Move { id: String, index: usize },
    Export { out: Option<PathBuf>, ids: Vec<String> },
    Import(PathBuf),
    Preview {
        file: PathBuf,
        collection: Option<String>,
    },
    Help,
    Version,
}

/// Everything a command or the TUI needs for one run.
pub struct Session {
    pub config: AppConfig,
    pub paths: Option<GamePaths>,
    pub path_error: Option<String>,
    pub host: Arc<LocalHost>,
    pub extension: Extension,
}

impl Session {
    fn open(options: &GlobalOptions) -> Result<Self> {
        let mut config = AppConfig::load_or_create()?;
        if let Some(root) = &options.game_root {
            config.game_root = Some(root.clone());
        }
        if let Some(dir) = &options.user_dir {
            config.user_dir = Some(dir.clone());
        }

        let (paths, path_error) = match config.detect_paths() {
            Ok(paths) => (Some(paths), None),
            Err(err) => {
                warn!("game paths not detected: {err:#}");
                (None, Some(format!("{err:#}")))
            }
        };
        if let Some(paths) = &paths {
            if let Err(err) = poe2::prepare_for_modding(paths) {
                warn!("prepare override dir failed: {err:#}");
            }
        }

        let host = Arc::new(LocalHost::new(paths.as_ref().map(|paths| paths.mod_dir.clone())));
        let extension = Extension::new(paths.clone(), host.clone(), config.flush_delay());
        Ok(Self {
            config,
            paths,
            path_error,
            host,
            extension,
        })
    }

    /// Host notices raised since the last call, as display strings.
    pub fn drain_notices(&self) -> Vec<String> {
        self.host
            .take_notices()
            .into_iter()
            .map(|notice| notice.message)
            .collect()
    }
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args)? {
        CliAction::Ui(options) => {
            let session = Session::open(&options)?;
            ui::run(session)
        }
        CliAction::Command {
            command,
            format,
            options,
        } => match command {
            CliCommand::Help => {
                print_help();
                Ok(())
            }
            CliCommand::Version => {
                println!("deadfire-order v{}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            command => {
                let mut session = Session::open(&options)?;
                let result = run_command(&mut session, command, format);
                for notice in session.drain_notices() {
                    eprintln!("Warning: {notice}");
                }
                session.extension.shutdown();
                result
            }
        },
    }
}

fn parse_args(args: &[String]) -> Result<CliAction> {
    let (options, tokens) = parse_global_options(args)?;
    let format = if options.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let Some(head) = tokens.first() else {
        return Ok(CliAction::Ui(options));
    };

    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head.as_str() {
        "--help" | "-h" | "help" => CliCommand::Help,
        "--version" | "-V" | "version" => CliCommand::Version,
        "paths" => CliCommand::Paths,
        "order" | "list" => CliCommand::Order,
        "enable" => CliCommand::Enable(single_id(head, rest)?),
        "disable" => CliCommand::Disable(single_id(head, rest)?),
        "move" => {
            let [id, index] = rest else {
                bail!("move requires <mod> <index>");
            };
            let index = index
                .parse()
                .with_context(|| format!("invalid index: {index}"))?;
            CliCommand::Move {
                id: id.to_string(),
                index,
            }
        }
        "export" => parse_export(rest)?,
        "preview" => parse_preview(rest)?,
        "import" => {
            let [file] = rest else {
                bail!("import requires a collection file");
            };
            CliCommand::Import(PathBuf::from(file))
        }
        other => bail!("Unknown command: {other} (see --help)"),
    };

    Ok(CliAction::Command {
        command,
        format,
        options,
    })
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut options = GlobalOptions::default();
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => options.json = true,
            "--format" => {
                let value = iter.next().context("--format requires a value")?;
                options.json = parse_format(value)? == OutputFormat::Json;
            }
            value if value.starts_with("--format=") => {
                options.json = parse_format(value.trim_start_matches("--format="))?
                    == OutputFormat::Json;
            }
            "--game-root" => {
                let value = iter.next().context("--game-root requires a path")?;
                options.game_root = Some(PathBuf::from(value));
            }
            value if value.starts_with("--game-root=") => {
                options.game_root = Some(PathBuf::from(value.trim_start_matches("--game-root=")));
            }
            "--user-dir" => {
                let value = iter.next().context("--user-dir requires a path")?;
                options.user_dir = Some(PathBuf::from(value));
            }
            value if value.starts_with("--user-dir=") => {
                options.user_dir = Some(PathBuf::from(value.trim_start_matches("--user-dir=")));
            }
            _ => tokens.push(arg.to_string()),
        }
    }
    Ok((options, tokens))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    OutputFormat::parse(value).with_context(|| format!("Unknown format: {value}"))
}

fn single_id(command: &str, rest: &[String]) -> Result<String> {
    match rest {
        [id] => Ok(id.to_string()),
        _ => bail!("{command} requires exactly one mod folder name"),
    }
}

fn parse_export(args: &[String]) -> Result<CliCommand> {
    let mut out = None;
    let mut ids = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--out" | "-o" => {
                let value = iter.next().context("--out requires a path")?;
                out = Some(PathBuf::from(value));
            }
            value if value.starts_with("--out=") => {
                out = Some(PathBuf::from(value.trim_start_matches("--out=")));
            }
            _ => ids.push(arg.to_string()),
        }
    }
    Ok(CliCommand::Export { out, ids })
}

fn parse_preview(args: &[String]) -> Result<CliCommand> {
    let mut file = None;
    let mut collection = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--collection" | "-c" => {
                let value = iter.next().context("--collection requires a mod id")?;
                collection = Some(value.to_string());
            }
            value if value.starts_with("--collection=") => {
                collection = Some(value.trim_start_matches("--collection=").to_string());
            }
            value if file.is_none() => file = Some(PathBuf::from(value)),
            value => bail!("unexpected argument: {value}"),
        }
    }
    let file = file.context("preview requires a collection file")?;
    Ok(CliCommand::Preview { file, collection })
}

fn read_collection(file: &std::path::Path) -> Result<CollectionData> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("read collection {}", file.display()))?;
    serde_json::from_str(&raw).context("parse collection")
}

fn run_command(session: &mut Session, command: CliCommand, format: OutputFormat) -> Result<()> {
    match command {
        CliCommand::Paths => list_paths(session, format),
        CliCommand::Order => {
            session.extension.reload();
            list_order(session, format)
        }
        CliCommand::Enable(id) => {
            session.extension.reload();
            place(session, &id, Container::Enabled, usize::MAX)
        }
        CliCommand::Disable(id) => {
            session.extension.reload();
            place(session, &id, Container::Disabled, 0)
        }
        CliCommand::Move { id, index } => {
            session.extension.reload();
            let Some((container, _)) = session.extension.editor().lists().locate(&id) else {
                bail!("Unknown mod: {id}");
            };
            place(session, &id, container, index)
        }
        CliCommand::Export { out, ids } => {
            session.extension.reload();
            export(session, out, ids)
        }
        CliCommand::Import(file) => {
            let data = read_collection(&file)?;
            session.extension.reload();
            session.extension.import_collection(&data)?;
            println!("Imported {} load order entries", data.load_order.len());
            Ok(())
        }
        CliCommand::Preview { file, collection } => {
            let data = read_collection(&file)?;
            let Some(lists) = session
                .extension
                .preview_collection(&data, collection.as_deref())
            else {
                bail!(
                    "Not an installed collection: {}",
                    collection.as_deref().unwrap_or_default()
                );
            };
            let registry = session.host.mods(session.config.active_game.as_str());
            print_items(order_items(&lists, &registry), format)
        }
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn place(session: &mut Session, id: &str, container: Container, index: usize) -> Result<()> {
    if session.paths.is_none() {
        bail!(
            "{} not found: {}",
            poe2::GAME_NAME,
            session.path_error.as_deref().unwrap_or("no install detected")
        );
    }
    let extension = &mut session.extension;
    if extension.editor().lists().locate(id).is_none() {
        bail!("Unknown mod: {id}");
    }
    if !extension
        .editor_mut()
        .transfer(id, container, index, Instant::now())
    {
        println!("{id} is already there");
        return Ok(());
    }
    extension
        .try_flush_now()
        .with_context(|| format!("save load order after moving {id}"))?;
    if let Some((container, position)) = extension.editor().lists().locate(id) {
        println!("{id}: {} #{}", container.label(), position + 1);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct OrderItem<'a> {
    position: usize,
    id: &'a str,
    name: &'a str,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_game_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_game_version: Option<&'a str>,
}

/// Enabled mods first, then disabled, with a running position.
fn order_items<'a>(lists: &'a Lists, registry: &'a ModRegistry) -> Vec<OrderItem<'a>> {
    lists
        .enabled
        .iter()
        .map(|item| (item, true))
        .chain(lists.disabled.iter().map(|item| (item, false)))
        .enumerate()
        .map(|(position, (item, enabled))| {
            let versions = registry
                .get(&item.id)
                .and_then(|mod_entry| mod_entry.game_versions.as_ref());
            OrderItem {
                position,
                id: &item.id,
                name: &item.name,
                enabled,
                min_game_version: versions.map(|range| range.min.as_str()),
                max_game_version: versions.map(|range| range.max.as_str()),
            }
        })
        .collect()
}

fn list_order(session: &Session, format: OutputFormat) -> Result<()> {
    let editor = session.extension.editor();
    print_items(order_items(editor.lists(), editor.registry()), format)
}

fn print_items(items: Vec<OrderItem<'_>>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No mods found.");
            }
            for item in items {
                let enabled = if item.enabled { "x" } else { " " };
                let versions = match (item.min_game_version, item.max_game_version) {
                    (Some(min), Some(max)) => format!("  [game {min}-{max}]"),
                    _ => String::new(),
                };
                if item.name == item.id {
                    println!("{:>3} [{enabled}] {}{versions}", item.position + 1, item.id);
                } else {
                    println!(
                        "{:>3} [{enabled}] {} ({}){versions}",
                        item.position + 1,
                        item.name,
                        item.id
                    );
                }
            }
        }
    }
    Ok(())
}

fn export(session: &Session, out: Option<PathBuf>, ids: Vec<String>) -> Result<()> {
    let ids = if ids.is_empty() {
        session
            .host
            .mods(session.config.active_game.as_str())
            .ids()
            .cloned()
            .collect()
    } else {
        ids
    };
    let data = session.extension.export_collection(&ids)?;
    let raw = serde_json::to_string_pretty(&data).context("serialize collection")?;
    match out {
        Some(path) => {
            fs::write(&path, raw).with_context(|| format!("write {}", path.display()))?;
            println!(
                "Exported {} load order entries to {}",
                data.load_order.len(),
                path.display()
            );
        }
        None => println!("{raw}"),
    }
    Ok(())
}

#[derive(Serialize)]
struct PathsOutput {
    game: &'static str,
    game_root: Option<String>,
    mod_dir: Option<String>,
    user_dir: Option<String>,
    modconfig_path: Option<String>,
    error: Option<String>,
}

fn list_paths(session: &Session, format: OutputFormat) -> Result<()> {
    let show = |path: &std::path::Path| path.display().to_string();
    let paths = session.paths.as_ref();
    let output = PathsOutput {
        game: session.config.active_game.display_name(),
        game_root: paths.map(|paths| show(&paths.game_root)),
        mod_dir: paths.map(|paths| show(&paths.mod_dir)),
        user_dir: paths.map(|paths| show(&paths.user_dir)),
        modconfig_path: paths.map(|paths| show(&paths.modconfig_path)),
        error: session.path_error.clone(),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            let unknown = || "-".to_string();
            println!("Game: {}", output.game);
            println!("Game root: {}", output.game_root.unwrap_or_else(unknown));
            println!("Mods: {}", output.mod_dir.unwrap_or_else(unknown));
            println!("User dir: {}", output.user_dir.unwrap_or_else(unknown));
            println!(
                "Mod config: {}",
                output.modconfig_path.unwrap_or_else(unknown)
            );
            if let Some(error) = output.error {
                println!("Warning: {error}");
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("deadfire-order v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  deadfire-order                       Launch TUI");
    println!("  deadfire-order order                 Show the load order");
    println!("  deadfire-order enable <mod>          Enable a mod (appended)");
    println!("  deadfire-order disable <mod>         Disable a mod");
    println!("  deadfire-order move <mod> <index>    Move a mod within its list");
    println!("  deadfire-order export [mods...]      Export the load order for a collection");
    println!("  deadfire-order import <file>         Replace the load order from a collection");
    println!("  deadfire-order preview <file>        Show a collection's load order against installed mods");
    println!("  deadfire-order paths                 Show detected paths");
    println!();
    println!("Options:");
    println!("  --json, --format <json|text>         Output format");
    println!("  --out <file>                         Write export to a file");
    println!("  --collection <mod>                   Limit preview to one installed collection");
    println!("  --game-root <path>                   Override the game directory");
    println!("  --user-dir <path>                    Override the folder holding modconfig.json");
    println!("  -h, --help                           Show help");
    println!("  -V, --version                        Show version");
}
