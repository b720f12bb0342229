use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "treedex",
    about = "Keep a full-text search index in sync with a hierarchical \
             content tree"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rebuild the whole index from a content export (full, destructive)
    Rebuild(RebuildArgs),
    /// Re-index a single node from a content export
    Reindex(ReindexArgs),
    /// Delete a node and all of its descendants from the index
    Delete(DeleteArgs),
    /// Search the index
    Search(SearchArgs),
    /// Show or replace the stored index criteria
    Criteria {
        #[command(subcommand)]
        action: CriteriaAction,
    },
    /// Manage protected node overrides
    Protect {
        #[command(subcommand)]
        action: ProtectAction,
    },
    /// Show index status and statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Rebuild --

#[derive(Debug, Parser)]
pub struct RebuildArgs {
    /// Path to the JSON content export
    pub content: PathBuf,

    /// Rebuild only this node type (IndexAll instead of a full rebuild)
    #[arg(short = 't', long = "type")]
    pub node_type: Option<String>,
}

// -- Reindex --

#[derive(Debug, Parser)]
pub struct ReindexArgs {
    /// Path to the JSON content export
    pub content: PathBuf,

    /// Id of the node to re-index
    #[arg(long)]
    pub id: i64,
}

// -- Delete --

#[derive(Debug, Parser)]
pub struct DeleteArgs {
    /// Id of the node whose subtree should be removed
    #[arg(long)]
    pub id: i64,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Free-text query over the criteria fields
    pub query: Option<String>,

    /// Match a single node id
    #[arg(long)]
    pub id: Option<i64>,

    /// Restrict to one node type
    #[arg(short = 't', long = "type")]
    pub node_type: Option<String>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Criteria --

#[derive(Debug, Subcommand)]
pub enum CriteriaAction {
    /// Print the stored criteria
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace the stored criteria from a JSON file
    Set {
        /// Path to a JSON criteria document
        file: PathBuf,
    },
    /// Swap only the parent-id scope, keeping everything else
    Scope {
        /// New parent id; omit to clear the scope
        #[arg(long)]
        parent_id: Option<i64>,
    },
}

// -- Protect --

#[derive(Debug, Subcommand)]
pub enum ProtectAction {
    /// Add a node id to the protected set
    Add {
        /// Node id to protect
        id: i64,
    },
    /// Remove a node id from the protected set
    Remove {
        /// Node id to unprotect
        id: i64,
    },
    /// List protected node ids
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "treedex",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from(["treedex", "search", "hello"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query.as_deref(), Some("hello"));
                assert_eq!(args.count, 10);
                assert_eq!(args.id, None);
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_search_by_id() {
        let cli = Cli::parse_from(["treedex", "search", "--id", "2112"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, None);
                assert_eq!(args.id, Some(2112));
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_criteria_scope() {
        let cli = Cli::parse_from([
            "treedex",
            "criteria",
            "scope",
            "--parent-id",
            "1116",
        ]);
        match cli.command {
            Command::Criteria {
                action: CriteriaAction::Scope { parent_id },
            } => assert_eq!(parent_id, Some(1116)),
            _ => panic!("expected criteria scope command"),
        }
    }
}
