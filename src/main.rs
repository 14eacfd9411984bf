use anyhow::Result;
use bit::areas::repository::{Repository, RepositoryOptions};
use bit::artifacts::index::stage::Stage;
use bit::artifacts::objects::object_format::ObjectFormat;
use bit::commands::plumbing::cat_file::CatFileMode;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bit",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "A git-compatible object store and staging index",
    long_about = "Stores file content as zlib-compressed, content-addressed loose objects \
    and tracks staged files in a git-format index.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[arg(
        short = 'C',
        global = true,
        value_name = "PATH",
        help = "Run as if started in <PATH>"
    )]
    repository: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "BIT_OBJECT_FORMAT",
        default_value = "sha1",
        help = "Hash used for object IDs (sha1 or sha256)"
    )]
    object_format: ObjectFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command creates the object database of a new repository \
        in the current directory or at the path given with -C."
    )]
    Init,
    #[command(
        name = "hash-object",
        about = "Hash a file and optionally write it to the object database",
        long_about = "This command prints the blob ID of a file. \
        With -w the blob is also stored in the object database."
    )]
    HashObject {
        #[arg(short, long, help = "Write the object to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: String,
    },
    #[command(
        name = "cat-file",
        about = "Print the content, type or size of an object",
        long_about = "This command prints information about a stored object. \
        The object may be named by its full ID or an unambiguous prefix.",
        group(ArgGroup::new("mode").required(true).args(["pretty", "object_type", "size"]))
    )]
    CatFile {
        #[arg(short = 'p', help = "Print the object content")]
        pretty: bool,
        #[arg(short = 't', help = "Print the object type")]
        object_type: bool,
        #[arg(short = 's', help = "Print the object size")]
        size: bool,
        #[arg(index = 1)]
        object: String,
    },
    #[command(
        name = "add",
        about = "Add file contents to the index",
        long_about = "This command stores the current content of the given files as blobs \
        and stages them. Directories are added recursively."
    )]
    Add {
        #[arg(index = 1, required = true, num_args = 1..)]
        paths: Vec<String>,
    },
    #[command(
        name = "rm",
        about = "Remove files from the index",
        long_about = "This command unstages the given paths. Workspace files are never deleted, \
        so --cached is required."
    )]
    Rm {
        #[arg(long, required = true, help = "Only remove from the index")]
        cached: bool,
        #[arg(long, value_parser = parse_stage, help = "Only remove this merge stage (0-3)")]
        stage: Option<Stage>,
        #[arg(index = 1, required = true, num_args = 1..)]
        paths: Vec<String>,
    },
    #[command(
        name = "ls-files",
        about = "Show the files in the index",
        long_about = "This command lists the staged paths in index order."
    )]
    LsFiles {
        #[arg(short = 's', long = "stage", help = "Show mode, object ID and stage")]
        stage: bool,
    },
}

fn parse_stage(value: &str) -> Result<Stage> {
    Ok(Stage::try_from(value.parse::<u32>()?)?)
}

/// Log to stderr, filtered by `BIT_LOG` (warnings only by default)
fn init_tracing() {
    let filter = EnvFilter::try_from_env("BIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let path = match cli.repository {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let options = RepositoryOptions {
        object_format: cli.object_format,
        ..Default::default()
    };
    let mut repository = Repository::new(&path, options, Box::new(std::io::stdout()))?;

    match &cli.command {
        Commands::Init => repository.init()?,
        Commands::HashObject { write, file } => repository.hash_object(file, *write)?,
        Commands::CatFile {
            object_type,
            size,
            object,
            ..
        } => {
            let mode = match (*object_type, *size) {
                (true, _) => CatFileMode::Type,
                (_, true) => CatFileMode::Size,
                _ => CatFileMode::Pretty,
            };
            repository.cat_file(object, mode)?
        }
        Commands::Add { paths } => repository.add(paths)?,
        Commands::Rm { stage, paths, .. } => repository.rm_cached(paths, *stage)?,
        Commands::LsFiles { stage } => repository.ls_files(*stage)?,
    }

    Ok(())
}
