// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Flow Studio tool server and CLI.
//!
//! Runs the JSON-RPC tool server over stdin/stdout by default. The other
//! subcommands expose the tree, validation and adapter operations directly.

#![allow(clippy::print_stdout, reason = "CLI tool needs to output to stdout")]

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flow_studio::cli::{self, ColorConfig};
use flow_studio::config::Config;
use flow_studio::mcp::McpServer;
use flow_studio::project::ProjectStore;
use flow_studio::tools::FlowToolHandler;
use flow_studio::workspace::{FileTreeBuilder, PathSandbox, ProjectFiles, WriteLocks};
use flow_studio::xml::{AdapterEditor, validate_xml_with};

/// Command-line arguments for Flow Studio.
#[derive(Parser, Debug)]
#[command(name = "flow-studio")]
#[command(about = "Backend for a visual pipeline-configuration editor")]
#[command(version = env!("FLOW_STUDIO_VERSION"))]
struct Args {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory whose subdirectories are projects. Overrides the config file.
    #[arg(long, global = true)]
    projects_root: Option<PathBuf>,
}

/// Subcommands supported by Flow Studio.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tool server (default if no subcommand given).
    Serve,

    /// Print the file tree of a directory.
    Tree {
        /// Directory to list. It is also the sandbox root.
        path: PathBuf,

        /// Expand every subdirectory.
        #[arg(long, short)]
        recursive: bool,

        /// Disable colored output.
        #[arg(long)]
        nocolor: bool,
    },

    /// Check that a file is a single well-formed XML document.
    Validate {
        /// File to check.
        file: PathBuf,
    },

    /// Replace the adapter with the given name in an XML file.
    /// Prints the new document unless `--write` is given.
    ReplaceAdapter {
        /// Configuration file.
        file: PathBuf,

        /// Value of the adapter's `name` attribute.
        adapter: String,

        /// File holding the replacement `<Adapter>` element.
        fragment: PathBuf,

        /// Write the result back to the file instead of printing it.
        #[arg(long)]
        write: bool,
    },

    /// Show or edit the recent projects history.
    Recent {
        /// The history action (default: list).
        #[command(subcommand)]
        action: Option<RecentAction>,

        /// Disable colored output.
        #[arg(long, global = true)]
        nocolor: bool,
    },

    /// List the projects under the projects root.
    Projects {
        /// Disable colored output.
        #[arg(long)]
        nocolor: bool,
    },
}

/// Recent projects subcommands.
#[derive(Subcommand, Clone, Debug)]
enum RecentAction {
    /// List remembered projects, most recent first.
    List,
    /// Forget a project root.
    Remove {
        /// Root path as shown by `recent list`.
        root: String,
    },
}

/// Entry point: dispatches to the server or a CLI subcommand.
///
/// # Errors
///
/// Returns an error if the subcommand fails.
fn main() -> Result<()> {
    let args = Args::parse();

    let default_directive = match args.command {
        None | Some(Command::Serve) => "flow_studio=info",
        Some(_) => "flow_studio=warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;

    match args.command {
        None | Some(Command::Serve) => run_server(&config),
        Some(Command::Tree {
            path,
            recursive,
            nocolor,
        }) => run_tree(&config, &path, recursive, nocolor),
        Some(Command::Validate { file }) => run_validate(&config, &file),
        Some(Command::ReplaceAdapter {
            file,
            adapter,
            fragment,
            write,
        }) => run_replace_adapter(&config, &file, &adapter, &fragment, write),
        Some(Command::Recent { action, nocolor }) => run_recent(&config, action, nocolor),
        Some(Command::Projects { nocolor }) => run_projects(&config, nocolor),
    }
}

/// Loads layered configuration; command-line flags win.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(root) = &args.projects_root {
        config.projects_root = Some(root.clone());
    }
    Ok(config)
}

/// Runs the tool server until stdin closes.
///
/// # Errors
///
/// Returns an error if the projects cannot be loaded or stdio fails.
fn run_server(config: &Config) -> Result<()> {
    info!("Starting flow-studio {}", env!("FLOW_STUDIO_VERSION"));
    if let Some(root) = config.projects_root() {
        info!("Projects root: {}", root.display());
    }

    let handler = FlowToolHandler::from_config(config)?;
    info!("Recent projects file: {}", handler.recent().file().display());

    let mut server = McpServer::new(handler);
    server.run()
}

fn run_tree(config: &Config, path: &Path, recursive: bool, nocolor: bool) -> Result<()> {
    let colors = ColorConfig::new(nocolor);
    let builder =
        FileTreeBuilder::new(PathSandbox::new(path)?).with_max_depth(config.max_tree_depth);
    let tree = builder
        .list_tree("", recursive)
        .with_context(|| format!("Cannot list {}", path.display()))?;
    print!("{}", cli::render_tree(&tree, &colors));
    Ok(())
}

fn run_validate(config: &Config, file: &Path) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    match validate_xml_with(&config.parser(), &text) {
        None => {
            println!("{}: ok", file.display());
            Ok(())
        }
        Some(message) => bail!("{}: {message}", file.display()),
    }
}

fn run_replace_adapter(
    config: &Config,
    file: &Path,
    adapter: &str,
    fragment_file: &Path,
    write: bool,
) -> Result<()> {
    let fragment = fs::read_to_string(fragment_file)
        .with_context(|| format!("Failed to read {}", fragment_file.display()))?;
    let editor = AdapterEditor::new(config.parser());

    if write {
        let parent = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = file
            .file_name()
            .ok_or_else(|| anyhow!("Not a file: {}", file.display()))?;
        let locks = WriteLocks::new();
        ProjectFiles::new(PathSandbox::new(parent)?, &locks)
            .with_editor(editor)
            .update_adapter(name, adapter, &fragment)?;
        println!("Replaced adapter '{adapter}' in {}", file.display());
        return Ok(());
    }

    let xml =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    println!("{}", editor.replace(&xml, adapter, &fragment)?);
    Ok(())
}

fn run_recent(config: &Config, action: Option<RecentAction>, nocolor: bool) -> Result<()> {
    let colors = ColorConfig::new(nocolor);
    let recent = config.recent_projects()?;

    let projects = match action {
        None | Some(RecentAction::List) => recent.list(),
        Some(RecentAction::Remove { root }) => recent.remove(&root)?,
    };
    print!(
        "{}",
        cli::render_recent(&projects, &colors, cli::terminal_width())
    );
    Ok(())
}

fn run_projects(config: &Config, nocolor: bool) -> Result<()> {
    let colors = ColorConfig::new(nocolor);
    let root = config
        .projects_root()
        .ok_or_else(|| anyhow!("No projects root; pass --projects-root or set projects_root"))?;
    let store = ProjectStore::scan(root, config.parser())?;
    print!("{}", cli::render_projects(&store.list_projects()?, &colors));
    Ok(())
}
