mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oscat_core::{
    Algorithm, AttributeFilters, Engine, NameResolver, ObjectMetadata, ObjectStore, ObjectType,
    Operation, Outcome, Request, Store, StoreResolver, TreeListing,
};
use output::{
    AddOutput, AddedObject, ExistsOutput, InitOutput, OutputWriter, PutOutput, RefInfo,
    RefsListOutput, RefsRmOutput, RefsSetOutput, SizeOutput, TypeOutput,
};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code for a fatal error.
const FATAL: u8 = 128;

/// Oscat - resolve and print objects from a content-addressed store
#[derive(Parser)]
#[command(name = "oscat")]
#[command(about = "Resolve and print objects from a content-addressed store", long_about = None)]
#[command(version)]
struct Cli {
    /// Store root directory (defaults to OSCAT_ROOT env var or ./oscat-store)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Report results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new store
    Init {
        /// Hash algorithm to use
        #[arg(long, default_value = "blake3")]
        algo: String,
    },

    /// Write a raw object from a file or stdin
    Put {
        /// Object type
        #[arg(short = 't', long = "type", default_value = "blob", value_parser = parse_object_type)]
        object_type: ObjectType,

        /// File to read, or `-` for stdin
        file: PathBuf,
    },

    /// Add files or directories to the store
    Add {
        /// Paths to add
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Create a reference to the added content
        #[arg(long)]
        ref_name: Option<String>,
    },

    /// Manage references
    #[command(subcommand)]
    Refs(RefsCommands),

    /// Print an object's type
    Type {
        /// Report non-standard types instead of failing
        #[arg(long)]
        allow_unknown_type: bool,

        object: String,
    },

    /// Print an object's size in bytes
    Size {
        /// Report objects of non-standard types instead of failing
        #[arg(long)]
        allow_unknown_type: bool,

        object: String,
    },

    /// Exit with status 0 if the object exists, 1 if not
    Exists { object: String },

    /// Print an object's content as the given type
    Extract {
        #[arg(value_parser = parse_object_type)]
        object_type: ObjectType,

        object: String,
    },

    /// Print blob content converted for the working tree
    Filters {
        /// Path used for attribute lookup (defaults to the <rev>:<path> path)
        #[arg(long)]
        path: Option<String>,

        object: String,
    },

    /// Print blob content through its textconv driver
    Textconv {
        /// Path used for attribute lookup (defaults to the <rev>:<path> path)
        #[arg(long)]
        path: Option<String>,

        object: String,
    },

    /// Pretty-print an object
    Show { object: String },
}

#[derive(Subcommand)]
enum RefsCommands {
    /// Point a reference at an object
    Set {
        /// Reference name
        name: String,

        /// Object to reference
        object: String,
    },

    /// List all references
    List,

    /// Remove a reference
    Rm {
        /// Reference name
        name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    // Determine store root: CLI arg > OSCAT_ROOT env var > ./oscat-store default
    let root = cli
        .root
        .or_else(|| std::env::var_os("OSCAT_ROOT").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./oscat-store"));
    tracing::debug!(root = %root.display(), "using store");

    let output = OutputWriter::new(cli.json);
    match run(cli.command, &root, &output) {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Missing) => ExitCode::from(1),
        Err(e) => {
            output.write_error(&e, FATAL);
            ExitCode::from(FATAL)
        }
    }
}

fn run(command: Commands, root: &Path, output: &OutputWriter) -> Result<Outcome> {
    match command {
        Commands::Init { algo } => cmd_init(root, &algo, output),
        Commands::Put { object_type, file } => cmd_put(root, object_type, &file, output),
        Commands::Add { paths, ref_name } => cmd_add(root, paths, ref_name, output),
        Commands::Refs(refs_cmd) => match refs_cmd {
            RefsCommands::Set { name, object } => cmd_refs_set(root, &name, &object, output),
            RefsCommands::List => cmd_refs_list(root, output),
            RefsCommands::Rm { name } => cmd_refs_rm(root, &name, output),
        },
        Commands::Type {
            allow_unknown_type,
            object,
        } => cmd_type(root, &object, allow_unknown_type, output),
        Commands::Size {
            allow_unknown_type,
            object,
        } => cmd_size(root, &object, allow_unknown_type, output),
        Commands::Exists { object } => cmd_exists(root, &object, output),
        Commands::Extract {
            object_type,
            object,
        } => cmd_content(root, Request::new(&object, Operation::ExtractTyped(object_type))),
        Commands::Filters { path, object } => cmd_content(
            root,
            Request::new(&object, Operation::FilteredWorkingTree).with_path(path.as_deref()),
        ),
        Commands::Textconv { path, object } => cmd_content(
            root,
            Request::new(&object, Operation::TextConv).with_path(path.as_deref()),
        ),
        Commands::Show { object } => cmd_content(root, Request::new(&object, Operation::Pretty)),
    }
}

fn parse_object_type(name: &str) -> std::result::Result<ObjectType, String> {
    ObjectType::parse(name).map_err(|_| format!("invalid object type '{}'", name))
}

fn open_store(root: &Path) -> Result<Store> {
    Store::open(root).with_context(|| format!("Failed to open store at {}", root.display()))
}

/// Build an engine over the store at `root` and hand it to `f`.
fn with_engine<T>(root: &Path, f: impl FnOnce(&Engine<'_>) -> Result<T>) -> Result<T> {
    let store = open_store(root)?;
    let resolver = StoreResolver::new(&store);
    let lister = TreeListing::new(&store);
    let filters = AttributeFilters::load(&store)
        .with_context(|| format!("Failed to read attributes in {}", root.display()))?;

    let engine = Engine::new(&store, &resolver, &lister)
        .with_filter(&filters)
        .with_textconv(&filters);
    f(&engine)
}

/// Run a request whose output is object content, straight to stdout.
fn cmd_content(root: &Path, request: Request<'_>) -> Result<Outcome> {
    with_engine(root, |engine| {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        engine
            .execute(&request, &mut handle)
            .with_context(|| format!("Failed to read '{}'", request.spec))
    })
}

fn lookup(root: &Path, request: Request<'_>) -> Result<ObjectMetadata> {
    with_engine(root, |engine| {
        engine
            .metadata(&request)
            .with_context(|| format!("Failed to inspect '{}'", request.spec))
    })
}

fn cmd_init(root: &Path, algo: &str, output: &OutputWriter) -> Result<Outcome> {
    let algorithm = match algo {
        "blake3" | "blake3-256" => Algorithm::Blake3,
        _ => anyhow::bail!("Unsupported algorithm: {}", algo),
    };

    Store::init(root, algorithm)
        .with_context(|| format!("Failed to initialize store at {}", root.display()))?;

    let data = InitOutput {
        success: true,
        result_code: 0,
        root: root.display().to_string(),
        algorithm: algorithm.as_str().to_string(),
    };
    output.write(&data, || {
        format!(
            "Initialized oscat store at {}\nAlgorithm: {}\n",
            root.display(),
            algorithm.as_str()
        )
    })?;
    Ok(Outcome::Done)
}

fn cmd_put(
    root: &Path,
    object_type: ObjectType,
    file: &Path,
    output: &OutputWriter,
) -> Result<Outcome> {
    let store = open_store(root)?;

    let data = if file == Path::new("-") {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            anyhow::bail!("Refusing to read object content from a terminal");
        }
        let mut buf = Vec::new();
        stdin
            .lock()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?
    };

    let hash = store
        .write_object(object_type, &data)
        .with_context(|| format!("Failed to write {} object", object_type))?;

    let result = PutOutput {
        success: true,
        result_code: 0,
        hash,
        object_type: object_type.to_string(),
        size: data.len() as u64,
    };
    output.write(&result, || format!("{}\n", hash))?;
    Ok(Outcome::Done)
}

fn cmd_add(
    root: &Path,
    paths: Vec<PathBuf>,
    ref_name: Option<String>,
    output: &OutputWriter,
) -> Result<Outcome> {
    let store = open_store(root)?;

    let mut objects = Vec::new();
    for path in &paths {
        let hash = store
            .add_path(path)
            .with_context(|| format!("Failed to add path: {}", path.display()))?;
        objects.push(AddedObject {
            hash,
            path: path.display().to_string(),
        });
    }

    // The reference points at the last path added.
    let reference = match (&ref_name, objects.last()) {
        (Some(name), Some(last)) => {
            store
                .refs()
                .set(name, &last.hash)
                .with_context(|| format!("Failed to create reference: {}", name))?;
            Some(RefInfo {
                name: name.clone(),
                hash: last.hash,
            })
        }
        _ => None,
    };

    let data = AddOutput {
        success: true,
        result_code: 0,
        objects,
        reference,
    };
    output.write(&data, || {
        let mut text = String::new();
        for obj in &data.objects {
            text.push_str(&format!("{} {}\n", obj.hash, obj.path));
        }
        if let Some(reference) = &data.reference {
            text.push_str(&format!(
                "Created reference: {} -> {}\n",
                reference.name, reference.hash
            ));
        }
        text
    })?;
    Ok(Outcome::Done)
}

fn cmd_refs_set(root: &Path, name: &str, object: &str, output: &OutputWriter) -> Result<Outcome> {
    let store = open_store(root)?;

    let hash = StoreResolver::new(&store)
        .resolve(object)
        .with_context(|| format!("Failed to resolve '{}'", object))?
        .hash;
    if !store.exists(&hash) {
        anyhow::bail!("Object not found: {}", hash);
    }

    store
        .refs()
        .set(name, &hash)
        .with_context(|| format!("Failed to set reference: {}", name))?;

    let data = RefsSetOutput {
        success: true,
        result_code: 0,
        name: name.to_string(),
        hash,
    };
    output.write(&data, || format!("{} -> {}\n", name, hash))?;
    Ok(Outcome::Done)
}

fn cmd_refs_list(root: &Path, output: &OutputWriter) -> Result<Outcome> {
    let store = open_store(root)?;

    let refs: Vec<RefInfo> = store
        .refs()
        .list()
        .context("Failed to list references")?
        .into_iter()
        .map(|(name, hash)| RefInfo { name, hash })
        .collect();

    let data = RefsListOutput {
        success: true,
        result_code: 0,
        refs,
    };
    output.write(&data, || {
        data.refs
            .iter()
            .map(|r| format!("{} -> {}\n", r.name, r.hash))
            .collect()
    })?;
    Ok(Outcome::Done)
}

fn cmd_refs_rm(root: &Path, name: &str, output: &OutputWriter) -> Result<Outcome> {
    let store = open_store(root)?;

    store
        .refs()
        .remove(name)
        .with_context(|| format!("Failed to remove reference: {}", name))?;

    let data = RefsRmOutput {
        success: true,
        result_code: 0,
        name: name.to_string(),
    };
    output.write(&data, || format!("Removed reference: {}\n", name))?;
    Ok(Outcome::Done)
}

fn cmd_type(
    root: &Path,
    object: &str,
    allow_unknown_type: bool,
    output: &OutputWriter,
) -> Result<Outcome> {
    let request = Request::new(object, Operation::PrintType).allow_unknown_type(allow_unknown_type);
    let metadata = lookup(root, request)?;

    let data = TypeOutput {
        success: true,
        result_code: 0,
        object: object.to_string(),
        object_type: metadata.object_type.to_string(),
    };
    output.write(&data, || format!("{}\n", data.object_type))?;
    Ok(Outcome::Done)
}

fn cmd_size(
    root: &Path,
    object: &str,
    allow_unknown_type: bool,
    output: &OutputWriter,
) -> Result<Outcome> {
    let request = Request::new(object, Operation::PrintSize).allow_unknown_type(allow_unknown_type);
    let size = lookup(root, request)?.size;

    let data = SizeOutput {
        success: true,
        result_code: 0,
        object: object.to_string(),
        size,
    };
    output.write(&data, || format!("{}\n", size))?;
    Ok(Outcome::Done)
}

fn cmd_exists(root: &Path, object: &str, output: &OutputWriter) -> Result<Outcome> {
    let outcome = with_engine(root, |engine| {
        engine
            .execute(&Request::new(object, Operation::CheckExists), &mut io::sink())
            .with_context(|| format!("Failed to inspect '{}'", object))
    })?;

    if output.is_json() {
        let data = ExistsOutput {
            success: true,
            result_code: if outcome == Outcome::Done { 0 } else { 1 },
            object: object.to_string(),
            exists: outcome == Outcome::Done,
        };
        output.write(&data, String::new)?;
    }
    Ok(outcome)
}
