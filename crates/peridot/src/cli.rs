//! Command dispatch for the `peridot` entrypoint.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use eyre::{Context, Result, eyre};
use peridot_expr::{ExprNode, parse_expression, tokenize};
use peridot_licenses::{
    LicenseList, LicenseStore, NodeId, expression_for_node, find_new_leaves_needed, intern_node,
    provision_custom_leaves, provision_license_list,
};

use crate::config::{Config, LogLevel};
use crate::output::{write_json, write_line, write_nodes, write_tokens, write_tree};
use crate::state::{read_state, update_state};

/// Parse SPDX license expressions and intern them into shared node records.
#[derive(Parser, Debug)]
#[command(name = "peridot", author, version, about)]
pub(crate) struct Cli {
    /// JSON state file holding leaves and nodes [env: PERIDOT_STATE].
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) state: Option<Utf8PathBuf>,
    /// Directory holding `licenses.json` [env: PERIDOT_LICENSE_LIST].
    #[arg(long, global = true, value_name = "DIR")]
    pub(crate) license_list: Option<Utf8PathBuf>,
    /// Log level (trace, debug, info, warn, error) [env: PERIDOT_LOG_LEVEL].
    #[arg(long, global = true, value_name = "LEVEL")]
    pub(crate) log_level: Option<LogLevel>,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Supported commands.
#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Print the tokens of an expression, one per line.
    Tokens(ExpressionArgs),
    /// Parse an expression and print its canonical form.
    Parse(ParseArgs),
    /// Load the SPDX license list into the state file.
    LoadLicenses(LoadLicensesArgs),
    /// Print identifiers in an expression that have no leaf yet.
    Needed(ExpressionArgs),
    /// Intern an expression and print its node id.
    Intern(InternArgs),
    /// Print the expression stored under a node id.
    Show(ShowArgs),
    /// List every stored node record.
    Nodes,
    /// Remove every leaf and node from the state file.
    Reset,
}

#[derive(Args, Debug)]
pub(crate) struct ExpressionArgs {
    /// SPDX license expression, e.g. "MIT OR Apache-2.0".
    pub expression: String,
}

#[derive(Args, Debug)]
pub(crate) struct ParseArgs {
    /// SPDX license expression, e.g. "MIT OR Apache-2.0".
    pub expression: String,
    /// Print the node tree, one node per line.
    #[arg(long, conflicts_with = "json")]
    pub tree: bool,
    /// Emit the node tree as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct LoadLicensesArgs {
    /// License list directory; overrides `--license-list`.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<Utf8PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct InternArgs {
    /// SPDX license expression, e.g. "MIT OR Apache-2.0".
    pub expression: String,
    /// Add custom leaves for identifiers that have none before interning.
    #[arg(long)]
    pub provision: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ShowArgs {
    /// Node id printed by `intern` or `nodes`.
    pub id: u64,
}

pub(crate) fn run(command: Commands, config: &Config, out: &mut dyn Write) -> Result<()> {
    match command {
        Commands::Tokens(args) => handle_tokens(&args, out),
        Commands::Parse(args) => handle_parse(&args, out),
        Commands::LoadLicenses(args) => handle_load_licenses(&args, config, out),
        Commands::Needed(args) => handle_needed(&args, config, out),
        Commands::Intern(args) => handle_intern(&args, config, out),
        Commands::Show(args) => handle_show(&args, config, out),
        Commands::Nodes => handle_nodes(config, out),
        Commands::Reset => handle_reset(config, out),
    }
}

fn parse(expression: &str) -> Result<ExprNode> {
    parse_expression(expression).wrap_err_with(|| format!("invalid expression '{expression}'"))
}

fn handle_tokens(args: &ExpressionArgs, out: &mut dyn Write) -> Result<()> {
    let tokens = tokenize(&args.expression)
        .wrap_err_with(|| format!("invalid expression '{}'", args.expression))?;
    write_tokens(out, &tokens)
}

fn handle_parse(args: &ParseArgs, out: &mut dyn Write) -> Result<()> {
    let node = parse(&args.expression)?;
    if args.json {
        write_json(out, &node)
    } else if args.tree {
        write_tree(out, &node)
    } else {
        write_line(out, node.expression())
    }
}

fn handle_load_licenses(args: &LoadLicensesArgs, config: &Config, out: &mut dyn Write) -> Result<()> {
    let dir = args
        .dir
        .as_ref()
        .or_else(|| config.license_list.as_ref())
        .ok_or_else(|| {
            eyre!("no license list directory; pass --dir or set PERIDOT_LICENSE_LIST")
        })?;
    let list = LicenseList::load_dir(dir)
        .wrap_err_with(|| format!("failed to load SPDX license list from {dir}"))?;
    let inserted = update_state(&config.state_path, |store| {
        provision_license_list(store, &list).wrap_err("failed to store license list leaves")
    })?;
    write_line(
        out,
        &format!(
            "loaded {inserted} new leaves from SPDX license list {}",
            list.license_list_version
        ),
    )
}

fn handle_needed(args: &ExpressionArgs, config: &Config, out: &mut dyn Write) -> Result<()> {
    let node = parse(&args.expression)?;
    let needed = read_state(&config.state_path, |store| {
        find_new_leaves_needed(store, &node).wrap_err("failed to look up leaves")
    })?;
    needed
        .iter()
        .try_for_each(|identifier| write_line(out, identifier))
}

fn handle_intern(args: &InternArgs, config: &Config, out: &mut dyn Write) -> Result<()> {
    let node = parse(&args.expression)?;
    let id = update_state(&config.state_path, |store| {
        if args.provision {
            let needed =
                find_new_leaves_needed(&*store, &node).wrap_err("failed to look up leaves")?;
            provision_custom_leaves(&mut *store, needed.iter().map(String::as_str))
                .wrap_err("failed to provision custom leaves")?;
        }
        intern_node(&mut *store, &node)
            .wrap_err_with(|| format!("failed to intern '{}'", node.expression()))
    })?;
    tracing::info!(%id, expression = node.expression(), "interned expression");
    write_line(out, &id.to_string())
}

fn handle_show(args: &ShowArgs, config: &Config, out: &mut dyn Write) -> Result<()> {
    let node = read_state(&config.state_path, |store| {
        expression_for_node(store, NodeId::new(args.id))
            .wrap_err_with(|| format!("failed to rebuild node {}", args.id))
    })?;
    write_line(out, node.expression())
}

fn handle_nodes(config: &Config, out: &mut dyn Write) -> Result<()> {
    let nodes = read_state(&config.state_path, |store| {
        store.nodes().wrap_err("failed to list nodes")
    })?;
    write_nodes(out, &nodes)
}

fn handle_reset(config: &Config, out: &mut dyn Write) -> Result<()> {
    update_state(&config.state_path, |store| {
        store.reset().wrap_err("failed to reset store")
    })?;
    write_line(out, &format!("reset state file {}", config.state_path))
}
