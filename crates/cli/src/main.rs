use api_shared::{Identity, Role, TokenKeys};
use clap::{Parser, Subcommand};
use libris_core::{
    config::upload_roles_from_env_value, constants::DEFAULT_STORAGE_DIR, open_store, CoreConfig,
    SizeLimits, UploadRequest, UploadService,
};
use libris_files::{detect_media_type, ContentHash, HashIndex, JsonFileIndex};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "libris")]
#[command(about = "Libris upload store CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SHA-256 digest of a file
    Hash {
        /// File to hash
        file: PathBuf,
    },
    /// Store a file exactly as the upload endpoint would
    Store {
        /// File to store
        file: PathBuf,
        /// Standard (`tieuChuan`), e.g. `book`
        #[arg(long)]
        standard: String,
        /// Criterion (`tieuChi`), e.g. `image`
        #[arg(long)]
        criterion: String,
        /// Email that generic uploads are namespaced under
        #[arg(long, default_value = "admin@localhost")]
        owner: String,
        /// Declared MIME type (guessed from the file when omitted)
        #[arg(long)]
        content_type: Option<String>,
        /// Storage root (defaults to `LIBRIS_STORAGE_DIR`, then `private_uploads`)
        #[arg(long)]
        storage_dir: Option<PathBuf>,
    },
    /// Look up a file's digest in a directory's hash index
    Lookup {
        /// Directory holding the hash index
        dir: PathBuf,
        /// File whose content to look for
        file: PathBuf,
    },
    /// Issue a token signed with `LIBRIS_JWT_SECRET`
    Token {
        /// Email to put in the token
        email: String,
        /// Role number or name (1/admin, 2/librarian, 3/reader)
        role: String,
        /// Lifetime in hours
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Hash { file }) => match std::fs::read(&file) {
            Ok(bytes) => println!("{}", ContentHash::compute(&bytes)),
            Err(e) => eprintln!("Error reading {}: {}", file.display(), e),
        },
        Some(Commands::Store {
            file,
            standard,
            criterion,
            owner,
            content_type,
            storage_dir,
        }) => {
            let bytes = std::fs::read(&file)?;
            let storage_dir = storage_dir
                .or_else(|| std::env::var("LIBRIS_STORAGE_DIR").ok().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
            let cfg = Arc::new(CoreConfig::new(
                storage_dir,
                upload_roles_from_env_value(std::env::var("LIBRIS_UPLOAD_ROLES").ok())?,
                false,
                SizeLimits::from_env_values(
                    std::env::var("LIBRIS_MAX_IMAGE_MB").ok(),
                    std::env::var("LIBRIS_MAX_DOCUMENT_MB").ok(),
                    std::env::var("LIBRIS_MAX_GENERIC_MB").ok(),
                )?,
            )?);
            let store = open_store(&cfg)?;
            let service = UploadService::new(cfg, store);

            let content_type = content_type.unwrap_or_else(|| detect_media_type(&file, &bytes));
            let request = UploadRequest {
                standard,
                criterion,
                original_filename: file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                content_type,
                bytes,
            };

            match service.upload(&Identity::new(owner, Role::Admin), request) {
                Ok(stored) if stored.already_existed() => {
                    println!("File already exists: {}", stored.relative_path)
                }
                Ok(stored) => println!("Stored: {}", stored.relative_path),
                Err(e) => eprintln!("Error storing {}: {}", file.display(), e),
            }
        }
        Some(Commands::Lookup { dir, file }) => {
            let bytes = std::fs::read(&file)?;
            let digest = ContentHash::compute(&bytes);
            match JsonFileIndex.lookup(&dir, &digest) {
                Some(filename) => println!("{}", filename),
                None => println!("no match"),
            }
        }
        Some(Commands::Token {
            email,
            role,
            ttl_hours,
        }) => {
            let secret = std::env::var("LIBRIS_JWT_SECRET").unwrap_or_default();
            let keys = TokenKeys::from_secret(&secret)?;
            let role: Role = role.parse()?;
            let ttl = chrono::Duration::try_hours(ttl_hours).ok_or("ttl-hours is out of range")?;
            let token = keys.issue(&Identity::new(email, role), ttl)?;
            println!("{}", token);
        }
        None => {
            println!("Use --help to see the available commands.");
        }
    }

    Ok(())
}
