//! extent-dump
//!
//! Inspect and export collections straight from data files

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use crossbeam::channel;
use extent_reader::{
    Catalog, CollectionInput, FileSystem, InputConfig, LocalFileSystem, UnitReader, WorkUnit,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "extent-dump")]
#[command(about = "Read collections directly from database data files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the collections of a catalog file
    Collections {
        /// Path to the `<db>.ns` catalog
        catalog: PathBuf,
    },

    /// Print the planned work units
    Splits {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Count the records of a collection
    Count {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        workers: WorkerArgs,
    },

    /// Write every document as one line of JSON
    Json {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        workers: WorkerArgs,

        /// Output file [default: stdout]
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// TOML input configuration (replaces --dir/--db/--collection)
    #[arg(long, conflicts_with_all = ["dir", "db", "collection"])]
    config: Option<PathBuf>,

    /// Directory holding the catalog and data files
    #[arg(short = 'd', long)]
    dir: Option<PathBuf>,

    /// Database name
    #[arg(long)]
    db: Option<String>,

    /// Collection name, without the database prefix
    #[arg(short = 'c', long)]
    collection: Option<String>,
}

#[derive(Args, Debug)]
struct WorkerArgs {
    /// Number of worker threads
    #[arg(short = 'w', long, default_value = "4")]
    workers: usize,
}

impl InputArgs {
    fn resolve(&self) -> anyhow::Result<InputConfig> {
        if let Some(path) = &self.config {
            info!("Loading input configuration {:?}", path);
            return InputConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()));
        }

        match (&self.dir, &self.db, &self.collection) {
            (Some(dir), Some(db), Some(collection)) => {
                Ok(InputConfig::new(dir.clone(), db.clone(), collection.clone()))
            }
            _ => bail!("either --config or all of --dir, --db and --collection must be given"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Collections { catalog } => list_collections(&catalog),
        Command::Splits { input } => {
            let (_, units) = plan(&input)?;
            print_splits(&units)
        }
        Command::Count { input, workers } => {
            let (fs, units) = plan(&input)?;
            count(fs, &units, workers.workers)
        }
        Command::Json {
            input,
            workers,
            output,
        } => {
            let (fs, units) = plan(&input)?;
            export_json(fs, &units, workers.workers, output.as_deref())
        }
    }
}

fn list_collections(path: &Path) -> anyhow::Result<()> {
    let fs = LocalFileSystem::new();
    let catalog = Catalog::open(&fs, path)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for entry in catalog.entries() {
        writeln!(
            out,
            "{}\tfirst {}\tlast {}",
            entry.name, entry.first_block, entry.last_block
        )?;
    }

    info!("{} collections in {}", catalog.len(), path.display());
    Ok(())
}

fn plan(args: &InputArgs) -> anyhow::Result<(Arc<dyn FileSystem>, Vec<WorkUnit>)> {
    let config = args.resolve()?;
    let fs: Arc<dyn FileSystem> = Arc::new(config.locality.file_system());
    let input = CollectionInput::from_config(&config)?;

    let units = input.plan(fs.clone())?;
    info!("Planned {} work units", units.len());
    Ok((fs, units))
}

fn print_splits(units: &[WorkUnit]) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for unit in units {
        let block = unit.block();
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            block.path().display(),
            block.offset(),
            unit.size(),
            unit.preferred_hosts().join(",")
        )?;
    }
    Ok(())
}

fn count(fs: Arc<dyn FileSystem>, units: &[WorkUnit], workers: usize) -> anyhow::Result<()> {
    let mut total = 0u64;
    run_units(
        fs,
        units,
        workers,
        |mut reader| {
            for item in reader.by_ref() {
                item?;
            }
            Ok(reader.records_read())
        },
        |records| {
            total += records;
            Ok(())
        },
    )?;

    println!("{}", total);
    Ok(())
}

fn export_json(
    fs: Arc<dyn FileSystem>,
    units: &[WorkUnit],
    workers: usize,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut written = 0usize;
    run_units(
        fs,
        units,
        workers,
        |reader| {
            let mut lines = Vec::new();
            for item in reader {
                let (_, doc) = item?;
                lines.push(serde_json::to_string(&doc.to_json())?);
            }
            Ok(lines)
        },
        |lines| {
            for line in &lines {
                writeln!(out, "{}", line)?;
            }
            written += lines.len();
            Ok(())
        },
    )?;
    out.flush()?;

    info!("Wrote {} documents", written);
    Ok(())
}

/// Read every unit on a pool of scoped worker threads
///
/// Each worker receives its unit in transport form and rebuilds it before
/// reading. Results reach `sink` in plan order as soon as every earlier
/// unit has finished; only results that arrive early are held back.
fn run_units<T, F, S>(
    fs: Arc<dyn FileSystem>,
    units: &[WorkUnit],
    workers: usize,
    job: F,
    mut sink: S,
) -> anyhow::Result<()>
where
    T: Send,
    F: Fn(UnitReader<'_>) -> anyhow::Result<T> + Sync,
    S: FnMut(T) -> anyhow::Result<()>,
{
    let (work_tx, work_rx) = channel::unbounded::<(usize, Vec<u8>)>();
    let (result_tx, result_rx) = channel::unbounded::<(usize, anyhow::Result<T>)>();

    for (index, unit) in units.iter().enumerate() {
        work_tx.send((index, unit.to_bytes()?))?;
    }
    drop(work_tx);

    let workers = workers.max(1).min(units.len().max(1));
    let job = &job;
    let fs = fs.as_ref();

    crossbeam::thread::scope(|s| {
        for worker in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            s.spawn(move |_| {
                for (index, bytes) in work_rx.iter() {
                    let result = WorkUnit::from_bytes(&bytes)
                        .map_err(anyhow::Error::from)
                        .and_then(|unit| {
                            debug!("Worker {} reading unit {}", worker, index);
                            job(UnitReader::new(unit, fs))
                        });
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        // Dropped on early return so idle workers stop taking units
        let result_rx = result_rx;
        let mut ordered = InOrder::new();
        for (index, result) in result_rx.iter() {
            let value = result.with_context(|| format!("failed to read work unit {}", index))?;
            ordered.push(index, value, &mut sink)?;
        }
        ordered.finish(units.len())
    })
    .map_err(|_| anyhow::anyhow!("worker thread panicked"))?
}

/// Releases results in plan order, holding back those that finish early
struct InOrder<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> InOrder<T> {
    fn new() -> Self {
        InOrder {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    fn push<S>(&mut self, index: usize, value: T, sink: &mut S) -> anyhow::Result<()>
    where
        S: FnMut(T) -> anyhow::Result<()>,
    {
        self.pending.insert(index, value);
        while let Some(value) = self.pending.remove(&self.next) {
            sink(value)?;
            self.next += 1;
        }
        Ok(())
    }

    fn held(&self) -> usize {
        self.pending.len()
    }

    fn finish(self, total: usize) -> anyhow::Result<()> {
        if self.next != total {
            bail!("work unit {} was not read", self.next);
        }
        Ok(())
    }
}
