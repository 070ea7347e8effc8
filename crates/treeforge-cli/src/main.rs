//! treeforge command line
//!
//! Checks, prints and flattens saved document sets.

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use treeforge_core::{EditorConfig, EditorContext, JsonTreeCodec, TreeCodec};

mod render;

fn cli() -> Command {
    let file = Arg::new("file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Document set in JSON form");

    Command::new("treeforge")
        .version(treeforge_core::VERSION)
        .about("Behavior-tree document set tools")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Editor configuration (TOML)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .subcommand(
            Command::new("validate")
                .about("Check every document and its required ports")
                .arg(file.clone()),
        )
        .subcommand(
            Command::new("inspect")
                .about("Print document trees")
                .arg(file.clone())
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .help("Only this document"),
                ),
        )
        .subcommand(
            Command::new("flatten")
                .about("Inline every subtree reference and print the result as JSON")
                .arg(file)
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .required(true)
                        .help("Document to flatten"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write to this file instead of stdout"),
                ),
        )
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(path: &Path, config: EditorConfig) -> anyhow::Result<EditorContext> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let description = JsonTreeCodec::new()
        .decode(&text)
        .with_context(|| format!("cannot parse {}", path.display()))?;

    let mut ctx = EditorContext::new(config)?;
    ctx.load_document_set(&description)
        .with_context(|| format!("cannot load {}", path.display()))?;
    tracing::debug!(documents = ctx.registry().len(), "document set opened");
    Ok(ctx)
}

/// Print one line per document; `false` when anything is wrong
fn validate(ctx: &EditorContext) -> bool {
    let mut clean = true;
    for name in ctx.registry().names() {
        match ctx.flatten(&name) {
            Ok(_) => println!("{name}: ok"),
            Err(err) => {
                clean = false;
                println!("{name}: {err}");
            }
        }
    }
    for missing in ctx.check_required_ports() {
        clean = false;
        println!(
            "{}: {} ({}) has no value for required port {}",
            missing.document, missing.instance_name, missing.registration_id, missing.port
        );
    }
    clean
}

fn run(matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };
    let Some((command, args)) = matches.subcommand() else {
        bail!("no command given");
    };
    let Some(file) = args.get_one::<PathBuf>("file") else {
        bail!("no input file given");
    };
    let ctx = open(file, config)?;

    match command {
        "validate" => {
            let clean = validate(&ctx);
            Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        "inspect" => {
            let names = match args.get_one::<String>("tree") {
                Some(name) => vec![name.clone()],
                None => ctx.registry().names(),
            };
            for name in names {
                let tree = ctx.tree(&name)?;
                let main = if ctx.registry().main_name() == Some(name.as_str()) { " (main)" } else { "" };
                println!("{name}{main}");
                print!("{}", render::indented(&tree));
            }
            Ok(ExitCode::SUCCESS)
        }
        "flatten" => {
            let Some(name) = args.get_one::<String>("tree") else {
                bail!("--tree is required");
            };
            let flat = ctx.flatten(name)?;
            let json = serde_json::to_string_pretty(&flat)?;
            match args.get_one::<PathBuf>("output") {
                Some(path) => std::fs::write(path, json + "\n")
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => println!("{json}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        other => bail!("unknown command {other}"),
    }
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
