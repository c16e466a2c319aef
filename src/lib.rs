pub mod compress;
pub mod config;
pub mod diff;
pub mod err;
pub mod logging;
pub mod manager;
pub mod object;
pub mod storage;
pub mod util;

use std::{
    fs,
    io::{self, BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Args, Parser, Subcommand};

use crate::{
    compress::CompressionType,
    config::{Config, LogConfig, get_config, init_config},
    diff::{Diff, EditScript, Granularity},
    err::{Error, Result},
    manager::{Commit, RevisionManager},
    object::{ContentKey, RevisionId, Snapshot},
    storage::{FileSystem, Repository},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// The number of threads in parallel computing
    #[arg(short, long, default_value_t = 8)]
    threads: usize,

    /// Unit compared by the diff engine
    #[arg(short, long, default_value = "word")]
    granularity: Granularity,

    /// Compression of chains written to a store
    #[arg(short, long, default_value = "zlib")]
    compression_type: CompressionType,

    /// Use verbose output (-vv very verbose, -vvv very verbose to file)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compare two text files and write the edit script as JSON
    Diff(DiffArgs),
    /// Apply an edit script to the before-text
    Patch(PatchArgs),
    /// Apply an edit script backwards to the after-text
    Revert(RevertArgs),
    /// Squash two adjacent edit scripts into one
    Squash(SquashArgs),
    /// Record the current text of a content item as a new revision
    Commit(CommitArgs),
    /// List the revisions of a content item
    Log(ItemArgs),
    /// Print a content item as of one revision
    Show(ShowArgs),
    /// Check every chain in a store
    Verify(StoreArgs),
}

#[derive(Debug, Args)]
struct DiffArgs {
    /// Path to before-text
    before: PathBuf,
    /// Path to after-text
    after: PathBuf,
    /// Path to save the script (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct PatchArgs {
    /// Path to before-text
    before: PathBuf,
    /// Path to edit script
    script: PathBuf,
    /// Path to save the after-text (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RevertArgs {
    /// Path to after-text
    after: PathBuf,
    /// Path to edit script
    script: PathBuf,
    /// Path to save the before-text (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SquashArgs {
    /// Path to base script
    base: PathBuf,
    /// Path to squashing script
    squashing: PathBuf,
    /// Path to save the squashed script (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Store directory
    #[arg(short, long)]
    store: PathBuf,
}

#[derive(Debug, Args)]
struct ItemArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Site id
    #[arg(long)]
    site: i64,
    /// Content item id
    #[arg(long)]
    item: i64,
}

#[derive(Debug, Args)]
struct CommitArgs {
    #[command(flatten)]
    item: ItemArgs,
    /// Title text
    #[arg(long, default_value = "")]
    title: String,
    /// Excerpt text
    #[arg(long, default_value = "")]
    excerpt: String,
    /// Path to the content body
    #[arg(long)]
    content: PathBuf,
    /// Author id
    #[arg(long)]
    author: Option<i64>,
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[command(flatten)]
    item: ItemArgs,
    /// Revision id
    #[arg(short, long)]
    revision: i64,
}

fn read_text(path: &PathBuf) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::from_msg_err(&format!("cannot read {}", path.display()), &e))
}

fn read_script(path: &PathBuf) -> Result<EditScript> {
    EditScript::from_json(&read_text(path)?)
}

fn write_output(output: Option<&PathBuf>, data: &[u8]) -> Result<()> {
    match output {
        Some(path) => fs::write(path, data)?,
        None => {
            let mut writer = BufWriter::new(io::stdout().lock());
            writer.write_all(data)?;
            writer.flush()?;
        }
    }
    Ok(())
}

fn open_store(args: &StoreArgs) -> Result<RevisionManager<FileSystem>> {
    let config = get_config();
    let repository = Repository::new(FileSystem::new(&args.store)?, config.compression);
    Ok(RevisionManager::new(repository, config.granularity))
}

fn run(command: Commands) -> Result<()> {
    let granularity = get_config().granularity;
    match command {
        Commands::Diff(args) => {
            log::info!("reading before-text...");
            let before = read_text(&args.before)?;
            log::info!("reading after-text...");
            let after = read_text(&args.after)?;
            log::info!("comparing...");
            let script = EditScript::from_compare(before.as_str(), after.as_str(), granularity)?;
            let stats = script.stats();
            log::info!(
                "{} ops, +{} -{} chars",
                script.len(),
                stats.added_chars,
                stats.deleted_chars
            );
            write_output(args.output.as_ref(), script.to_json()?.as_bytes())
        }
        Commands::Patch(args) => {
            let before = read_text(&args.before)?;
            let script = read_script(&args.script)?;
            log::info!("patching...");
            let after = script.patch(before.as_str())?;
            write_output(args.output.as_ref(), after.as_bytes())
        }
        Commands::Revert(args) => {
            let after = read_text(&args.after)?;
            let script = read_script(&args.script)?;
            log::info!("reverting...");
            let before = script.revert(after.as_str())?;
            write_output(args.output.as_ref(), before.as_bytes())
        }
        Commands::Squash(args) => {
            let base = read_script(&args.base)?;
            let squashing = read_script(&args.squashing)?;
            log::info!("squashing...");
            let squashed = EditScript::from_squash(&base, &squashing, granularity)?;
            write_output(args.output.as_ref(), squashed.to_json()?.as_bytes())
        }
        Commands::Commit(args) => {
            let manager = open_store(&args.item.store)?;
            let key = ContentKey::new(args.item.site, args.item.item);
            let mut commit = Commit::new(Snapshot::new(
                args.title,
                args.excerpt,
                read_text(&args.content)?,
            ));
            commit.author_id = args.author;
            match manager.commit(key, commit)? {
                Some(record) => println!("{} {}", record.id().0, record.hash()),
                None => println!("unchanged"),
            }
            Ok(())
        }
        Commands::Log(args) => {
            let manager = open_store(&args.store)?;
            let chain = manager.chain(ContentKey::new(args.site, args.item))?;
            for record in chain.records().iter().rev() {
                println!(
                    "{:>6} {:>6} {} +{} -{} {}",
                    record.id().0,
                    record
                        .parent()
                        .map_or_else(|| "-".to_string(), |p| p.0.to_string()),
                    record.created(),
                    record.total_additions(),
                    record.total_deletions(),
                    record.hash()
                );
            }
            Ok(())
        }
        Commands::Show(args) => {
            let manager = open_store(&args.item.store)?;
            let key = ContentKey::new(args.item.site, args.item.item);
            let snapshot = manager.reconstruct(key, RevisionId(args.revision))?;
            let json = serde_json::to_string_pretty(&snapshot).map_err(Error::codec)?;
            write_output(None, json.as_bytes())
        }
        Commands::Verify(args) => {
            let manager = open_store(&args)?;
            let keys = manager.contents()?;
            log::info!("verifying {} chains...", keys.len());
            let results = manager.verify_all(&keys);
            let mut failed = 0;
            for (key, result) in &results {
                if let Err(e) = result {
                    failed += 1;
                    println!("{}: {}", key, e);
                }
            }
            if failed > 0 {
                return Err(Error::BrokenChain(format!(
                    "{} of {} chains failed verification",
                    failed,
                    results.len()
                )));
            }
            Ok(())
        }
    }
}

pub fn main() -> ExitCode {
    let cli = Cli::parse();
    init_config(Config {
        log_config: LogConfig::Verbose(cli.verbose),
        threads: cli.threads,
        granularity: cli.granularity,
        compression: cli.compression_type,
    });
    log::debug!("cli args: {:#?}", cli);
    match run(cli.command) {
        Ok(()) => {
            log::info!("success");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if e.is_defect() {
                log::error!("engine defect: {}", e);
            }
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
