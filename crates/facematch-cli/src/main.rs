use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[zbus::proxy(
    interface = "org.facematch.FaceMatch1",
    default_service = "org.facematch.FaceMatch1",
    default_path = "/org/facematch/FaceMatch1"
)]
trait FaceMatch {
    fn register(&self, id: &str, embedding: &str) -> zbus::Result<String>;
    fn recognize(&self, embeddings: &str, tolerance: f64) -> zbus::Result<String>;
    fn verify(&self, known: &str, probe: &str) -> zbus::Result<String>;
    fn sync(&self) -> zbus::Result<String>;
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "facematch", about = "FaceMatch identity matching CLI")]
struct Cli {
    /// Talk to a daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an identity embedding
    Register {
        /// Identity ID (e.g., a student or user ID)
        #[arg(short, long)]
        id: String,
        /// Embedding as a JSON array
        #[arg(short, long, conflicts_with = "file")]
        embedding: Option<String>,
        /// File containing the embedding JSON array
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Recognize the faces of one image from their embeddings
    Recognize {
        /// JSON array of embeddings, one per detected face
        #[arg(short, long)]
        embeddings: String,
        /// Match tolerance (omit to use the daemon default)
        #[arg(short, long)]
        tolerance: Option<f64>,
    },
    /// Compare a probe embedding against one known embedding
    Verify {
        #[arg(long)]
        known: String,
        #[arg(long)]
        probe: String,
    },
    /// Rebuild the daemon's index from its store
    Sync,
    /// Show daemon status
    Status,
}

/// Embedding JSON from the inline argument or a file, whichever was given.
fn embedding_source(inline: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (inline, file) {
        (Some(json), None) => Ok(json),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display())),
        (Some(_), Some(_)) => bail!("pass either --embedding or --file, not both"),
        (None, None) => bail!("an embedding is required (--embedding or --file)"),
    }
}

fn print_reply(reply: &str) {
    match serde_json::from_str::<serde_json::Value>(reply) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{reply}"),
        },
        Err(_) => println!("{reply}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = if cli.system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("failed to connect to D-Bus")?;
    let proxy = FaceMatchProxy::new(&connection)
        .await
        .context("facematchd not reachable")?;
    tracing::debug!(system = cli.system, "connected to facematchd");

    let reply = match cli.command {
        Commands::Register { id, embedding, file } => {
            let embedding = embedding_source(embedding, file)?;
            proxy.register(&id, embedding.trim()).await?
        }
        Commands::Recognize {
            embeddings,
            tolerance,
        } => proxy.recognize(&embeddings, tolerance.unwrap_or(0.0)).await?,
        Commands::Verify { known, probe } => proxy.verify(&known, &probe).await?,
        Commands::Sync => proxy.sync().await?,
        Commands::Status => proxy.status().await?,
    };

    print_reply(&reply);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_register() {
        let cli = Cli::try_parse_from(["facematch", "register", "--id", "s1", "--embedding", "[0.1]"])
            .unwrap();
        match cli.command {
            Commands::Register { id, embedding, file } => {
                assert_eq!(id, "s1");
                assert_eq!(embedding.as_deref(), Some("[0.1]"));
                assert!(file.is_none());
            }
            _ => panic!("expected register"),
        }
    }

    #[test]
    fn test_cli_rejects_both_sources() {
        let parsed = Cli::try_parse_from([
            "facematch", "register", "--id", "s1", "--embedding", "[0.1]", "--file", "e.json",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_cli_system_flag_is_global() {
        let cli = Cli::try_parse_from(["facematch", "status", "--system"]).unwrap();
        assert!(cli.system);
    }

    #[test]
    fn test_embedding_source() {
        assert_eq!(embedding_source(Some("[1]".into()), None).unwrap(), "[1]");
        assert!(embedding_source(None, None).is_err());

        let path = std::env::temp_dir().join(format!("facematch-cli-{}.json", std::process::id()));
        std::fs::write(&path, "[0.5, 0.5]\n").unwrap();
        assert_eq!(embedding_source(None, Some(path.clone())).unwrap(), "[0.5, 0.5]\n");
        let _ = std::fs::remove_file(&path);
    }
}
