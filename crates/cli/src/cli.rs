use clap::{Parser, Subcommand};
use doclib_core::{ConfigLoader, ConfigSource, DocLibConfig};
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "doclib")]
#[command(author, version, about = "Cached browsing of a file-backed document library", long_about = None)]
pub struct Cli {
    /// Library root directory (overrides config file and DOCLIB_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to a JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level when DOCLIB_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: Level,

    /// Disable the change watcher for long-running commands
    #[arg(long, global = true)]
    pub no_watch: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the library tree, or the subtree below a path
    Tree {
        /// Directory to expand (the library root when omitted)
        #[arg(long)]
        path: Option<String>,

        /// Levels to expand below the directory
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Print a document with its content
    Content {
        /// Document path relative to the library root
        path: String,
    },

    /// Print file metadata
    Metadata {
        /// File path relative to the library root
        path: String,
    },

    /// Print the MIME type and location of a file
    File {
        /// File path relative to the library root
        path: String,
    },

    /// Print the breadcrumb trail of a path
    Breadcrumb {
        /// Path relative to the library root
        path: String,
    },

    /// List recently modified documents
    Recent {
        /// Maximum number of documents
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Print cache and engine statistics
    Stats,

    /// Watch the library and run maintenance until interrupted
    Watch,
}

impl Cli {
    /// Resolve configuration from defaults, file and environment, then
    /// apply the command-line overrides.
    pub fn resolve_config(&self) -> doclib_core::Result<(DocLibConfig, Vec<ConfigSource>)> {
        let (mut config, mut sources) = ConfigLoader::load(self.config.clone())?;

        let mut overridden = false;
        if let Some(root) = &self.root {
            config.docs_root = root.clone();
            overridden = true;
        }
        if self.no_watch {
            config.watch = false;
            overridden = true;
        }
        if overridden {
            sources.push(ConfigSource::CommandLine);
            config.validate()?;
        }

        Ok((config, sources))
    }
}
