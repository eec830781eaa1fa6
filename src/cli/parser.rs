//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::agent::config::FanOutPolicy;
use crate::agent::router::Category;
use crate::retrieval::RetrieverConfig;

/// docqa: ask questions about your documentation.
///
/// Routes each question, plans research steps, searches the loaded
/// collections in parallel and answers with inline citations.
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the document database.
    ///
    /// Defaults to `docqa/docqa.db` under the user data directory.
    #[arg(short, long, env = "DOCQA_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Log format on stderr (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub log_format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask one question and print the answer.
    ///
    /// Requires an OpenAI-compatible API key.
    #[command(after_help = r#"Examples:
  docqa ask "How do I enable debug logging?"
  docqa ask "and on Windows?" --conversation history.json
  docqa ask "What changed in v2?" --details
  docqa --format json ask "How do I install it?" | jq '.answer'

Conversation file: a JSON array of {"role", "content"} messages, or an
object with a "messages" array."#)]
    Ask {
        /// The question.
        question: String,

        /// JSON file with the conversation so far.
        #[arg(short, long)]
        conversation: Option<PathBuf>,

        /// Show the plan, queries and cited sources.
        #[arg(long)]
        details: bool,

        /// Force the category, skipping the classifier.
        #[arg(long, hide = true, requires = "justification")]
        category: Option<Category>,

        /// Justification for a forced category.
        #[arg(long, hide = true, requires = "category")]
        justification: Option<String>,

        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Start an interactive conversation.
    ///
    /// Each line is one turn. Follow-up answers to clarification questions
    /// are classified again with the full history. Type `exit` to quit.
    Chat {
        /// Show the plan, queries and cited sources after each answer.
        #[arg(long)]
        details: bool,

        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Collection operations (list, load).
    #[command(subcommand)]
    Collections(CollectionCommands),

    /// Write default prompt templates to disk for customization.
    #[command(name = "init-prompts")]
    #[command(after_help = r#"Examples:
  docqa init-prompts                     # Write to ~/.config/docqa/prompts/
  docqa init-prompts --dir ./prompts     # Write to a custom directory
"#)]
    InitPrompts {
        /// Target directory. Defaults to `~/.config/docqa/prompts/`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Start MCP (Model Context Protocol) server.
    #[cfg(feature = "mcp")]
    #[command(subcommand)]
    Mcp(McpCommands),
}

/// Agent overrides shared by `ask` and `chat`.
#[derive(Args, Debug, Clone, Default)]
pub struct AgentArgs {
    /// Model for classification, planning and query generation (`provider/model`).
    #[arg(long)]
    pub query_model: Option<String>,

    /// Model for the final answer (`provider/model`).
    #[arg(long)]
    pub response_model: Option<String>,

    /// Maximum concurrent retrieval tasks.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Retrieval failure policy (fail-fast, best-effort).
    #[arg(long)]
    pub fan_out_policy: Option<FanOutPolicy>,

    /// Documents returned per collection search.
    #[arg(short = 'k', long)]
    pub search_k: Option<usize>,

    /// Directory containing prompt template files.
    #[arg(long)]
    pub prompt_dir: Option<PathBuf>,
}

/// Collection subcommands.
#[derive(Subcommand, Debug)]
pub enum CollectionCommands {
    /// List loaded collections.
    #[command(alias = "ls")]
    List,

    /// Load documents into a collection, creating it if needed.
    ///
    /// Documents already present (same identity) are skipped.
    #[command(after_help = r#"Examples:
  docqa collections load langchain docs.jsonl
  docqa collections load guides ./guides/*.md --chunk-size 2000

Input formats:
  .json   array of {"id"?, "content" | "page_content", "metadata"?} or one object
  .jsonl  one such object per line
  other   the whole file as one document (source = path, title = file name)"#)]
    Load {
        /// Collection name.
        collection: String,

        /// Files to load.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Maximum chunk size in characters [default: 4000, env: DOCQA_CHUNK_SIZE].
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlap between chunks in characters [default: 200, env: DOCQA_CHUNK_OVERLAP].
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
}

/// MCP server transport subcommands.
#[cfg(feature = "mcp")]
#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Serve over stdin/stdout.
    Stdio,

    /// Serve over streamable HTTP at `/mcp`.
    #[command(after_help = r#"Examples:
  docqa mcp sse                            # Listen on 127.0.0.1:3000
  docqa mcp sse --host 0.0.0.0 --port 8080
"#)]
    Sse {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}

impl Cli {
    /// Retrieval configuration from the environment, with `--db-path` applied.
    #[must_use]
    pub fn retriever_config(&self) -> RetrieverConfig {
        let mut config = RetrieverConfig::from_env();
        if let Some(path) = &self.db_path {
            config.database_path = Some(path.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_overrides() {
        let cli = Cli::try_parse_from([
            "docqa",
            "-vv",
            "ask",
            "how?",
            "--fan-out-policy",
            "best-effort",
            "-k",
            "6",
        ])
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ask {
                question, agent, ..
            } => {
                assert_eq!(question, "how?");
                assert_eq!(agent.fan_out_policy, Some(FanOutPolicy::BestEffort));
                assert_eq!(agent.search_k, Some(6));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_forced_category_requires_justification() {
        let result = Cli::try_parse_from(["docqa", "ask", "hi", "--category", "related"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_db_path_overrides_retriever_config() {
        let cli = Cli::try_parse_from(["docqa", "--db-path", "/tmp/x.db", "collections", "list"])
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            cli.retriever_config().database_path,
            Some(PathBuf::from("/tmp/x.db"))
        );
    }
}
