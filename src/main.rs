use anyhow::{anyhow, bail, Context, Result};
use cell_notebook::logging::{self, LogFormat};
use cell_notebook::{Action, CellId, CellType, Direction, Notebook, NotebookDir};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cell-notebook", version, about = "Notebook of code and text cells with an in-process bundler")]
struct Cli {
    /// Notebook directory, created when it does not exist
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Log filter, e.g. `debug` or `cell_notebook=trace` (RUST_LOG wins)
    #[arg(long)]
    log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List cells in order
    List,

    /// Insert an empty cell; appends when no anchor is given
    Insert {
        /// Insert after this cell
        #[arg(long, conflicts_with = "before")]
        after: Option<String>,

        /// Insert before this cell
        #[arg(long)]
        before: Option<String>,

        #[arg(short = 't', long = "type", default_value = "code")]
        cell_type: CellType,

        /// Initial content
        #[arg(long)]
        content: Option<String>,
    },

    /// Replace a cell's content
    Update { id: String, content: String },

    /// Move a cell up or down by one
    Move { id: String, direction: Direction },

    /// Delete a cell
    Delete { id: String },

    /// Bundle one code cell, or every code cell
    Bundle {
        id: Option<String>,

        /// Write `<id>.js` files into this directory instead of printing
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref(), cli.log_format);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let dir = NotebookDir::open_or_create(&cli.dir)?;
    let config = dir.load_config()?;
    let collection = dir.load_cells_or_seed()?;
    let mut notebook = Notebook::with_config(collection, &config, dir.root_dir())?;

    let mut failures = 0;
    match cli.command {
        Command::List => {
            print_cells(&notebook);
            return Ok(());
        }
        Command::Insert {
            after,
            before,
            cell_type,
            content,
        } => {
            let action = match after {
                Some(anchor) => Action::InsertCellAfter {
                    id: Some(CellId::from(anchor)),
                    cell_type,
                },
                None => Action::InsertCellBefore {
                    id: before.map(CellId::from),
                    cell_type,
                },
            };
            let id = notebook
                .apply(action)?
                .ok_or_else(|| anyhow!("Insert did not create a cell"))?;
            if let Some(content) = content {
                notebook.apply(Action::UpdateCell {
                    id: id.clone(),
                    content,
                })?;
            }
            println!("✓ Inserted {cell_type} cell {id}");
        }
        Command::Update { id, content } => {
            notebook.apply(Action::UpdateCell {
                id: CellId::from(id.as_str()),
                content,
            })?;
            println!("✓ Updated cell {id}");
        }
        Command::Move { id, direction } => {
            notebook.apply(Action::MoveCell {
                id: CellId::from(id.as_str()),
                direction,
            })?;
            print_cells(&notebook);
        }
        Command::Delete { id } => {
            notebook.apply(Action::DeleteCell {
                id: CellId::from(id.as_str()),
            })?;
            println!("✓ Deleted cell {id}");
        }
        Command::Bundle { id, out } => {
            let tasks = match id {
                Some(id) => vec![notebook.bundle_cell(&id)?],
                None => notebook.bundle_all(),
            };
            if tasks.is_empty() {
                println!("No code cells to bundle");
            }
            if let Some(out) = &out {
                fs::create_dir_all(out)
                    .with_context(|| format!("Failed to create output directory: {}", out.display()))?;
            }

            for task in tasks {
                let result = task.join().await.context("Bundle task did not finish")?;
                let cell_id = result.cell_id();
                match (result.code(), result.error()) {
                    (Some(code), _) => match &out {
                        Some(out) => {
                            let path = out.join(format!("{cell_id}.js"));
                            fs::write(&path, code)
                                .with_context(|| format!("Failed to write bundle: {}", path.display()))?;
                            println!("✓ {cell_id} -> {}", path.display());
                        }
                        None => {
                            println!("// ===== cell {cell_id} =====");
                            println!("{code}");
                        }
                    },
                    (None, error) => {
                        failures += 1;
                        eprintln!("✗ {cell_id}: {}", error.unwrap_or("unknown error"));
                    }
                }
            }
        }
    }

    dir.save(&notebook.store().snapshot(), &notebook.drain_history())?;
    if failures > 0 {
        bail!("{failures} bundle(s) failed");
    }
    Ok(())
}

fn print_cells(notebook: &Notebook) {
    let snapshot = notebook.store().snapshot();
    for (index, cell) in snapshot.cells().enumerate() {
        let first_line = cell.content.lines().next().unwrap_or("");
        println!("{index:>3}  {:<4}  {:<4}  {first_line}", cell.id, cell.cell_type);
    }
}
