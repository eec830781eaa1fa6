//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

#![allow(clippy::format_push_string)]

use std::io::{self, BufRead, Write as IoWrite};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, user_message};
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompt::PromptSet;
use crate::agent::router::Category;
use crate::agent::state::TurnInput;
use crate::cli::output::{OutputFormat, format_collections, format_turn};
#[cfg(feature = "mcp")]
use crate::cli::parser::McpCommands;
use crate::cli::parser::{AgentArgs, Cli, CollectionCommands, Commands};
use crate::core::{Document, DocumentRecord, Metadata};
use crate::error::{CommandError, Result};
use crate::retrieval::{RetrieverConfig, chunk_documents, create_retriever_provider, open_store};

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let retrieval = cli.retriever_config();

    match &cli.command {
        Commands::Ask {
            question,
            conversation,
            details,
            category,
            justification,
            agent,
        } => {
            let forced = category.zip(justification.clone());
            cmd_ask(
                &retrieval,
                agent,
                question,
                conversation.as_deref(),
                forced,
                *details,
                format,
            )
        }
        Commands::Chat { details, agent } => cmd_chat(&retrieval, agent, *details, format),
        Commands::Collections(sub) => execute_collections(sub, &retrieval, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
        #[cfg(feature = "mcp")]
        Commands::Mcp(cmd) => cmd_mcp(cmd, &retrieval),
    }
}

fn execute_collections(
    sub: &CollectionCommands,
    retrieval: &RetrieverConfig,
    format: OutputFormat,
) -> Result<String> {
    match sub {
        CollectionCommands::List => cmd_collections_list(retrieval, format),
        CollectionCommands::Load {
            collection,
            files,
            chunk_size,
            chunk_overlap,
        } => {
            let mut config = retrieval.clone();
            if let Some(size) = chunk_size {
                config.chunk_size = *size;
            }
            if let Some(overlap) = chunk_overlap {
                config.chunk_overlap = *overlap;
            }
            cmd_collections_load(&config, collection, files, format)
        }
    }
}

/// Builds the agent configuration from env + CLI overrides.
fn agent_config(args: &AgentArgs) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder().from_env().map_err(config_error)?;
    if let Some(model) = &args.query_model {
        builder = builder.query_model(model);
    }
    if let Some(model) = &args.response_model {
        builder = builder.response_model(model);
    }
    if let Some(n) = args.concurrency {
        builder = builder.max_concurrency(n);
    }
    if let Some(policy) = args.fan_out_policy {
        builder = builder.fan_out_policy(policy);
    }
    if let Some(dir) = &args.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    builder.build().map_err(config_error)
}

fn config_error(e: impl std::fmt::Display) -> crate::error::Error {
    CommandError::ExecutionFailed(format!("Agent configuration error: {e}")).into()
}

/// Opens the retrieval backend and wires the agent graph.
fn build_orchestrator(retrieval: &RetrieverConfig, args: &AgentArgs) -> Result<Orchestrator> {
    let config = agent_config(args)?;
    let retrievers = create_retriever_provider(retrieval)?;
    let mut search = retrieval.search_options();
    if let Some(k) = args.search_k {
        search.k = k;
    }
    debug!(
        query_model = %config.query_model,
        response_model = %config.response_model,
        retriever = retrievers.name(),
        k = search.k,
        "agent configured"
    );
    Ok(Orchestrator::from_config(&config, retrievers, search)?)
}

fn runtime() -> Result<Runtime> {
    Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn cmd_ask(
    retrieval: &RetrieverConfig,
    args: &AgentArgs,
    question: &str,
    conversation: Option<&Path>,
    forced: Option<(Category, String)>,
    details: bool,
    format: OutputFormat,
) -> Result<String> {
    if question.trim().is_empty() {
        return Err(CommandError::InvalidInput("question cannot be empty".to_string()).into());
    }

    let mut input = match conversation {
        Some(path) => parse_conversation(&std::fs::read_to_string(path)?)?,
        None => TurnInput::default(),
    };
    input.messages.push(user_message(question));
    if let Some((category, justification)) = forced {
        input = input.with_classification(category, justification);
    }

    let orchestrator = build_orchestrator(retrieval, args)?;
    let rt = runtime()?;
    let output = rt
        .block_on(orchestrator.run_turn(input))
        .map_err(|e| CommandError::ExecutionFailed(format!("Turn failed: {e}")))?;

    Ok(format_turn(&output, format, details))
}

/// Decodes a conversation file: a message array or a turn object.
fn parse_conversation(text: &str) -> Result<TurnInput> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| CommandError::InvalidInput(format!("conversation is not JSON: {e}")))?;
    let input = if value.is_array() {
        let messages: Vec<ChatMessage> = serde_json::from_value(value)
            .map_err(|e| CommandError::InvalidInput(format!("invalid message list: {e}")))?;
        TurnInput::new(messages)
    } else {
        serde_json::from_value(value)
            .map_err(|e| CommandError::InvalidInput(format!("invalid conversation: {e}")))?
    };
    Ok(input)
}

fn cmd_chat(
    retrieval: &RetrieverConfig,
    args: &AgentArgs,
    details: bool,
    format: OutputFormat,
) -> Result<String> {
    let orchestrator = build_orchestrator(retrieval, args)?;
    let rt = runtime()?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let turns = run_chat(&rt, &orchestrator, stdin.lock(), stdout.lock(), format, details)?;
    info!(turns, "chat session ended");
    Ok(String::new())
}

/// Runs an interactive conversation, one turn per input line.
///
/// The history carries across turns, so an answer to a clarification
/// question is classified with its context. A failed turn is reported and
/// its user message dropped. Returns the number of completed turns.
///
/// # Errors
///
/// Returns an error only on I/O failure.
pub fn run_chat<R: BufRead, W: IoWrite>(
    rt: &Runtime,
    orchestrator: &Orchestrator,
    input: R,
    mut out: W,
    format: OutputFormat,
    details: bool,
) -> Result<usize> {
    let mut messages: Vec<ChatMessage> = Vec::new();
    let mut turns = 0;

    write!(out, "> ")?;
    out.flush()?;
    for line in input.lines() {
        let line = line?;
        let text = line.trim();
        if matches!(text, "exit" | "quit" | "/exit" | "/quit") {
            break;
        }
        if !text.is_empty() {
            messages.push(user_message(text));
            match rt.block_on(orchestrator.run_turn(TurnInput::new(messages.clone()))) {
                Ok(output) => {
                    writeln!(out, "{}\n", format_turn(&output, format, details))?;
                    messages = output.messages;
                    turns += 1;
                }
                Err(e) => {
                    messages.pop();
                    writeln!(out, "error: {e}\n")?;
                }
            }
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(turns)
}

fn cmd_collections_list(retrieval: &RetrieverConfig, format: OutputFormat) -> Result<String> {
    let store = open_store(retrieval)?;
    let collections = store.collections()?;
    Ok(format_collections(&collections, format))
}

fn cmd_collections_load(
    retrieval: &RetrieverConfig,
    collection: &str,
    files: &[PathBuf],
    format: OutputFormat,
) -> Result<String> {
    if collection.trim().is_empty() {
        return Err(CommandError::InvalidInput("collection name cannot be empty".to_string()).into());
    }

    let mut documents = Vec::new();
    for path in files {
        let docs = read_documents(path)?;
        debug!(path = %path.display(), documents = docs.len(), "read input file");
        documents.extend(docs);
    }
    let read = documents.len();
    let chunks = chunk_documents(documents, retrieval.chunk_size, retrieval.chunk_overlap);

    let store = open_store(retrieval)?;
    let created = store.create_collection(collection)?;
    let inserted = store.load_documents(collection, &chunks)?;
    info!(collection, read, chunks = chunks.len(), inserted, "documents loaded");

    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            if created {
                output.push_str(&format!("Created collection '{collection}'\n"));
            }
            output.push_str(&format!(
                "Loaded {inserted} new chunk(s) into '{collection}' ({read} document(s), {} chunk(s), {} already present)\n",
                chunks.len(),
                chunks.len() - inserted
            ));
            Ok(output)
        }
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "collection": collection,
            "created": created,
            "documents": read,
            "chunks": chunks.len(),
            "inserted": inserted,
        }))),
    }
}

/// Reads documents from a `.json`, `.jsonl` or plain-text file.
fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)?;
    let invalid = |e: serde_json::Error| {
        CommandError::InvalidInput(format!("{}: {e}", path.display()))
    };

    let records: Vec<DocumentRecord> = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => match serde_json::from_str::<Value>(&text).map_err(invalid)? {
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value::<DocumentRecord>)
                .collect::<std::result::Result<_, _>>()
                .map_err(invalid)?,
            other => vec![serde_json::from_value(other).map_err(invalid)?],
        },
        Some("jsonl" | "ndjson") => text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<DocumentRecord>)
            .collect::<std::result::Result<_, _>>()
            .map_err(invalid)?,
        _ => {
            let mut metadata = Metadata::new();
            metadata.insert(
                "source".to_string(),
                Value::from(path.to_string_lossy().into_owned()),
            );
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                metadata.insert("title".to_string(), Value::from(name));
            }
            vec![DocumentRecord {
                id: None,
                content: text,
                metadata,
            }]
        }
    };

    Ok(records
        .into_iter()
        .filter(|r| !r.content.trim().is_empty())
        .map(DocumentRecord::into_document)
        .collect())
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    output.push_str(&format!(
                        "  {}\n",
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown")
                    ));
                }
                output.push_str("\nEdit these files to customize agent system prompts.\n");
                Ok(output)
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

/// Starts the MCP server with the specified transport.
///
/// Runs until the client disconnects (stdio) or the server is stopped (SSE).
#[cfg(feature = "mcp")]
fn cmd_mcp(cmd: &McpCommands, retrieval: &RetrieverConfig) -> Result<String> {
    use crate::mcp::{DocQaMcpServer, serve_sse, serve_stdio};

    let server = DocQaMcpServer::new(retrieval.clone()).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create MCP server: {e}"))
    })?;

    let rt = runtime()?;
    rt.block_on(async {
        match cmd {
            McpCommands::Stdio => serve_stdio(server).await,
            McpCommands::Sse { host, port } => serve_sse(server, host, *port).await,
        }
    })
    .map_err(|e| CommandError::ExecutionFailed(format!("MCP server error: {e}")))?;

    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent::message::Role;
    use crate::agent::testing::fakes::{
        FakeCapabilities, FakeClassifier, FakePlanner, FakeRetrievers,
    };
    use crate::retrieval::SearchOptions;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RetrieverConfig) {
        let temp_dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let config = RetrieverConfig {
            database_path: Some(temp_dir.path().join("docqa.db")),
            ..RetrieverConfig::default()
        };
        (temp_dir, config)
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap_or_else(|_| unreachable!());
        path
    }

    #[test]
    fn test_parse_conversation_shapes() {
        let list = parse_conversation(r#"[{"role": "user", "content": "hi"}]"#)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(list.messages.len(), 1);

        let object = parse_conversation(
            r#"{"messages": [{"role": "human", "content": "hi"}, {"role": "ai", "content": "hello"}]}"#,
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(object.messages[1].role, Role::Assistant);

        assert!(parse_conversation("not json").is_err());
    }

    #[test]
    fn test_read_documents_formats() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let json = write(
            &dir,
            "a.json",
            r#"[{"id": "a1", "content": "alpha"}, {"page_content": "beta", "metadata": {"title": "B"}}]"#,
        );
        let jsonl = write(&dir, "b.jsonl", "{\"id\": \"b1\", \"content\": \"gamma\"}\n\n{\"content\": \"\"}\n");
        let md = write(&dir, "guide.md", "# Guide\n\nInstall it.");

        let docs = read_documents(&json).unwrap_or_else(|_| unreachable!());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a1");
        assert!(!docs[1].id.is_empty());

        let docs = read_documents(&jsonl).unwrap_or_else(|_| unreachable!());
        assert_eq!(docs.len(), 1);

        let docs = read_documents(&md).unwrap_or_else(|_| unreachable!());
        assert_eq!(docs[0].title(), Some("guide.md"));
    }

    #[test]
    fn test_load_then_list_collections() {
        let (dir, config) = setup();
        let file = write(
            &dir,
            "docs.jsonl",
            "{\"id\": \"1\", \"content\": \"install with cargo\"}\n{\"id\": \"2\", \"content\": \"configure logging\"}\n",
        );

        let out = cmd_collections_load(&config, "guides", &[file.clone()], OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.contains("Created collection 'guides'"));
        assert!(out.contains("Loaded 2 new chunk(s)"));

        let again = cmd_collections_load(&config, "guides", &[file], OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let value: Value = serde_json::from_str(&again).unwrap_or_default();
        assert_eq!(value["inserted"], 0);
        assert_eq!(value["created"], false);

        let list = cmd_collections_list(&config, OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(list.contains("guides"));
    }

    #[test]
    fn test_init_prompts_writes_templates() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let out = cmd_init_prompts(Some(dir.path()), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.contains("Wrote 4 prompt template(s)"));

        let again = cmd_init_prompts(Some(dir.path()), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(again.contains("already exist"));
    }

    #[test]
    fn test_run_chat_keeps_history() {
        let fakes = FakeCapabilities::new(
            FakeClassifier::new(Category::OffTopicChitchat, &[], Some("Hello there!")),
            FakePlanner::new(&[]),
            3,
        );
        let retrievers: Arc<FakeRetrievers> = Arc::new(FakeRetrievers::new(&["docs"], 1));
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let orchestrator = Orchestrator::new(
            fakes.capabilities(),
            retrievers,
            &config,
            SearchOptions::default(),
        );
        let rt = Runtime::new().unwrap_or_else(|_| unreachable!());

        let mut out = Vec::new();
        let turns = run_chat(
            &rt,
            &orchestrator,
            "hi\n\nhow are you?\nexit\nignored\n".as_bytes(),
            &mut out,
            OutputFormat::Text,
            false,
        )
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(turns, 2);
        let text = String::from_utf8(out).unwrap_or_default();
        assert_eq!(text.matches("Hello there!").count(), 2);
        assert!(!text.contains("ignored"));
    }
}
