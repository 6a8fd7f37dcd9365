//=====================================================
// File: main.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: verbscript CLI entry point
// Objective: Run programs and stored verbs against a snapshot world, convert
//            between source and program trees, and list the opcode library
//=====================================================

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::Value as JsonValue;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use verbscript::{
    CollectingSink, Engine, EngineConfig, EntityId, EntityStore, ExecutionMode, MemoryStore,
    NotificationSink, Value, decompile, transpile,
};

#[derive(Parser, Debug)]
#[command(name = "verbscript", about = "verbscript CLI")]
pub struct Args {
    /// Engine configuration file; defaults to the user config dir.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a program file (JSON tree or source text).
    Run(RunArgs),
    /// Invoke a stored verb on an entity of a snapshot world.
    Invoke(InvokeArgs),
    /// Print the program tree for a source file.
    Transpile(FileArgs),
    /// Print source for a JSON program tree.
    Decompile(FileArgs),
    /// List every registered opcode with its metadata.
    Opcodes,
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    pub file: PathBuf,

    /// Use the tree-walking interpreter instead of the compiler.
    #[arg(long)]
    pub interpret: bool,

    /// Gas budget for this run.
    #[arg(long)]
    pub gas: Option<u64>,

    /// World snapshot to run against; an empty world otherwise.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Entity bound as `this`; a fresh entity when omitted.
    #[arg(long = "this")]
    pub this: Option<EntityId>,

    /// Write the world back to the snapshot after the run.
    #[arg(long)]
    pub save: bool,
}

#[derive(ClapArgs, Debug)]
pub struct InvokeArgs {
    pub snapshot: PathBuf,
    pub entity: EntityId,
    pub verb: String,

    /// Verb arguments, each a JSON value.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,

    #[arg(long)]
    pub caller: Option<EntityId>,

    #[arg(long)]
    pub interpret: bool,

    /// Leave the snapshot file untouched.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ClapArgs, Debug)]
pub struct FileArgs {
    pub file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Run(run) => run_file(run, config).await,
        Command::Invoke(invoke) => invoke_verb(invoke, config).await,
        Command::Transpile(file) => {
            let source = read_file(&file.file)?;
            let program = transpile(&source)
                .map_err(|err| anyhow!("{}: {err}", file.file.display()))?;
            println!("{}", serde_json::to_string_pretty(&program.to_json()?)?);
            Ok(())
        }
        Command::Decompile(file) => {
            let text = read_file(&file.file)?;
            let json: JsonValue = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON program", file.file.display()))?;
            print!("{}", decompile(&Value::from_json(&json)));
            Ok(())
        }
        Command::Opcodes => {
            let engine = Engine::with_standard_library(Arc::new(MemoryStore::new()), config)?;
            println!("{}", serde_json::to_string_pretty(engine.opcodes())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::load_default()?,
    };
    Ok(config.with_env_overrides()?)
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// JSON text is taken as a program tree; anything else is source.
fn load_program(path: &Path) -> Result<Value> {
    let text = read_file(path)?;
    if let Ok(json) = serde_json::from_str::<JsonValue>(&text) {
        return Ok(Value::from_json(&json));
    }
    transpile(&text).map_err(|err| anyhow!("{}: {err}", path.display()))
}

fn load_store(path: Option<&Path>) -> Result<Arc<MemoryStore>> {
    let store = match path {
        Some(path) => MemoryStore::load_snapshot(path)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?,
        None => MemoryStore::new(),
    };
    Ok(Arc::new(store))
}

async fn run_file(run: RunArgs, mut config: EngineConfig) -> Result<()> {
    if run.interpret {
        config.mode = ExecutionMode::Interpreted;
    }
    let program = load_program(&run.file)?;
    let store = load_store(run.snapshot.as_deref())?;
    let this = match run.this {
        Some(id) => id,
        None => store.create_entity(Default::default(), None)?,
    };
    debug!(entity = this, mode = ?config.mode, "running {}", run.file.display());

    let engine = Engine::with_standard_library(store.clone(), config)?;
    let sink = CollectingSink::new();
    let shared: Rc<dyn NotificationSink> = Rc::new(sink.clone());
    let result = engine
        .execute(&program, this, None, vec![], shared, run.gas)
        .await;

    print_notifications(&sink)?;
    let value = result?;
    println!("{}", serde_json::to_string_pretty(&value.to_json()?)?);

    if run.save {
        let path = run
            .snapshot
            .as_deref()
            .ok_or_else(|| anyhow!("--save requires --snapshot"))?;
        store.save_snapshot(path)?;
    }
    Ok(())
}

async fn invoke_verb(invoke: InvokeArgs, mut config: EngineConfig) -> Result<()> {
    if invoke.interpret {
        config.mode = ExecutionMode::Interpreted;
    }
    let args = invoke
        .args
        .iter()
        .map(|arg| {
            serde_json::from_str::<JsonValue>(arg)
                .map(|json| Value::from_json(&json))
                .with_context(|| format!("argument {arg} is not JSON"))
        })
        .collect::<Result<Vec<_>>>()?;
    let store = load_store(Some(&invoke.snapshot))?;

    let engine = Engine::with_standard_library(store.clone(), config)?;
    let sink = CollectingSink::new();
    let shared: Rc<dyn NotificationSink> = Rc::new(sink.clone());
    let result = engine
        .invoke_verb(invoke.entity, &invoke.verb, invoke.caller, args, shared)
        .await;

    print_notifications(&sink)?;
    let value = result?;
    println!("{}", serde_json::to_string_pretty(&value.to_json()?)?);

    if !invoke.dry_run {
        store.save_snapshot(&invoke.snapshot)?;
    }
    Ok(())
}

fn print_notifications(sink: &CollectingSink) -> Result<()> {
    for notification in sink.take() {
        println!(
            "[{}] {}",
            notification.event,
            serde_json::to_string(&notification.payload)?
        );
    }
    Ok(())
}
