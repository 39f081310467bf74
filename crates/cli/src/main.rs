//! wmspec CLI - build, inspect and assign workload task trees.

mod assignment;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wmspec_core::{SpecDefaults, TaskTree, TaskType};
use wmspec_storage::{JsonWorkloadStore, WorkloadStore};

use crate::assignment::Assignment;

#[derive(Parser)]
#[command(name = "wmspec")]
#[command(about = "Workload task specification trees", long_about = None)]
struct Cli {
    /// Directory holding stored workloads
    #[arg(long, global = true, default_value = ".wmspec")]
    store: PathBuf,

    /// JSON file overriding built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a workload with an empty root task
    New {
        /// Workload name, also the root task name
        workload: String,
        /// Root task type
        #[arg(long, default_value = "Processing")]
        root_type: String,
    },
    /// Add a task below an existing one
    AddTask {
        workload: String,
        /// Path name of the parent task
        parent: String,
        name: String,
        /// Task type
        #[arg(long = "type")]
        task_type: Option<String>,
    },
    /// Delete a task and everything below it
    DeleteTask {
        workload: String,
        parent: String,
        name: String,
    },
    /// Show the task tree
    Show {
        workload: String,
    },
    /// Apply an assignment document and rederive output names
    Assign {
        workload: String,
        /// Assignment JSON file
        assignment: PathBuf,
    },
    /// Print the job splitting parameters of a task
    Splitting {
        workload: String,
        /// Path name of the task
        task: String,
        /// Leave out the performance section
        #[arg(long)]
        no_performance: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let defaults = match &cli.config {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            SpecDefaults::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => SpecDefaults::default(),
    };

    let mut store = JsonWorkloadStore::new(&cli.store).await?;

    match cli.command {
        Commands::New { workload, root_type } => {
            if store.load(&workload).await?.is_some() {
                bail!("workload {} already exists", workload);
            }
            let mut tree = TaskTree::new(&workload);
            tree.root_mut().set_task_type(root_type.parse::<TaskType>()?);
            store.save(&tree).await?;
            println!("Created workload: {}", workload);
        }
        Commands::AddTask { workload, parent, name, task_type } => {
            let mut tree = load(&store, &workload).await?;
            let task = tree.add_task(&parent, &name)?;
            if let Some(t) = task_type {
                task.set_task_type(t.parse::<TaskType>()?);
            }
            let path = task.path_name().to_string();
            store.save(&tree).await?;
            println!("Added task: {}", path);
        }
        Commands::DeleteTask { workload, parent, name } => {
            let mut tree = load(&store, &workload).await?;
            tree.delete_child(&parent, &name)?;
            store.save(&tree).await?;
            println!("Deleted task: {}/{}", parent.trim_end_matches('/'), name);
        }
        Commands::Show { workload } => {
            let tree = load(&store, &workload).await?;
            println!("Workload: {}", tree.name());
            for task in tree.iter() {
                let task_type = task.task_type().map(|t| t.as_str()).unwrap_or("-");
                println!(
                    "  {} | {} | logs {}",
                    task.path_name(),
                    task_type,
                    task.task_log_base_lfn(&defaults.lfn)
                );
                for output in task.list_output_datasets_and_modules() {
                    println!("      {} -> {}", output.output_module, output.dataset);
                }
            }
        }
        Commands::Assign { workload, assignment } => {
            let json = tokio::fs::read_to_string(&assignment)
                .await
                .with_context(|| format!("reading {}", assignment.display()))?;
            let assignment: Assignment = serde_json::from_str(&json).context("parsing assignment")?;

            let mut tree = load(&store, &workload).await?;
            assignment.apply(&mut tree, &defaults)?;
            let version = store.save(&tree).await?;
            info!(workload = %workload, version, "saved assigned workload");

            println!("Output datasets:");
            for task in tree.iter() {
                for output in task.list_output_datasets_and_modules() {
                    println!("  {} | {} -> {}", task.path_name(), output.output_module, output.dataset);
                }
            }
        }
        Commands::Splitting { workload, task, no_performance } => {
            let tree = load(&store, &workload).await?;
            let node = tree
                .find(&task)
                .with_context(|| format!("task {} not found in {}", task, workload))?;
            let params = node.job_splitting_parameters(!no_performance)?;
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
    }

    Ok(())
}

async fn load(store: &JsonWorkloadStore, workload: &str) -> Result<TaskTree> {
    store
        .load(workload)
        .await?
        .with_context(|| format!("workload {} not found", workload))
}
