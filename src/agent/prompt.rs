//! System prompts and template rendering for agents.
//!
//! Prompts are plain string templates with named `{placeholder}`s that are
//! substituted before being sent as the system message. Literal braces are
//! written `{{` and `}}`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// System prompt for the query classifier.
///
/// Placeholders: `{collection_list}`.
pub const ROUTER_SYSTEM_PROMPT: &str = r#"You are a documentation advocate. Your job is to help people using the documented software answer any issues they are running into.

A user will come to you with an inquiry. Your first job is to classify what type of inquiry it is. The types of inquiries you should classify it as are:

## `more-info`
Classify a user inquiry as this if you need more information before you will be able to help them. Examples include:
- The user complains about an error but doesn't provide the error
- The user says something isn't working but doesn't explain why/how it's not working

## `related`
Classify a user inquiry as this if it can be answered by looking up information in the documentation collections listed below.

## `chitchat`
Classify a user inquiry as this if it is small talk, a greeting, or a question about you rather than about the documentation.

## `unrelated`
Classify a user inquiry as this if it is a question that has nothing to do with the documented software.

The documentation collections you can search are:
{collection_list}

Respond with a JSON object with these fields:
- `type`: one of `more-info`, `related`, `chitchat`, `unrelated`
- `logic`: one or two sentences explaining the classification
- `collections`: for `related`, the names of at most 2 collections from the list above that are most likely to contain the answer; otherwise an empty list
- `response`: for every type except `related`, the message to send to the user. For `more-info`, ask a single friendly follow-up question. For `chitchat`, reply briefly and steer back to the documentation. For `unrelated`, politely decline and explain that you can only answer questions about the documented software. For `related`, null."#;

/// System prompt for the plan builder.
pub const RESEARCH_PLAN_SYSTEM_PROMPT: &str = r#"You are a documentation expert and a world-class researcher, here to assist with any and all questions or issues about the documented software. Users may come to you with questions or issues.

Based on the conversation below, generate a plan for how you will research the answer to their question.

The plan should generally not be more than 3 steps long, it can be as short as one. The length of the plan depends on the question.

You do not need to specify where you want to research for all steps of the plan, but it's sometimes helpful.

Respond with a JSON object of the form {"steps": ["first step", "second step"]}."#;

/// System prompt for the researcher's query generator.
///
/// Placeholders: `{collections}`.
pub const GENERATE_QUERIES_SYSTEM_PROMPT: &str = r#"Generate 3 search queries to search for to answer the user's question.

These search queries should be diverse in nature - do not generate repetitive ones. They will be run against these documentation collections: {collections}

Respond with a JSON object of the form {"queries": ["first query", "second query", "third query"]}."#;

/// System prompt for the response synthesizer.
///
/// Placeholders: `{collections}`, `{context}`.
pub const RESPONSE_SYSTEM_PROMPT: &str = r"You are an expert programmer and problem-solver, tasked with answering any question about the documentation in these collections: {collections}

Generate a comprehensive and informative answer for the given question based solely on the provided search results (URL and content). Do NOT ramble, and adjust your response length based on the question. If they ask a question that can be answered in one sentence, do that. If 5 paragraphs of detail is needed, do that. You must only use information from the provided search results. Use an unbiased and journalistic tone. Combine search results together into a coherent answer. Do not repeat text. Cite search results using [${{number}}] notation, where the number is the document's index in the context. Only cite the most relevant results that answer the question accurately. Place these citations at the end of the individual sentence or paragraph that reference them. Do not put them all at the end, but rather sprinkle them throughout.

You should use bullet points in your answer for readability. Put citations where they apply rather than putting them all at the end.

If there is nothing in the context relevant to the question at hand, do NOT make up an answer. Rather, tell them why you're unsure and ask for any additional information that may help you answer better.

Sometimes, what a user is asking may NOT be possible. Do NOT tell them that things are possible if you don't see evidence for it in the context below. If you don't see based in the information below that something is possible, do NOT say that it is - instead say that you're not sure.

Anything between the following `context` html blocks is retrieved from a knowledge bank, not part of the conversation with the user.

<context>
{context}
</context>";

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/docqa/prompts";

/// Filename for the router prompt template.
const ROUTER_FILENAME: &str = "router.md";
/// Filename for the research plan prompt template.
const RESEARCH_PLAN_FILENAME: &str = "research_plan.md";
/// Filename for the query generation prompt template.
const GENERATE_QUERIES_FILENAME: &str = "generate_queries.md";
/// Filename for the response prompt template.
const RESPONSE_FILENAME: &str = "response.md";

/// A set of system prompt templates for all agents.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Query classifier template.
    pub router: String,
    /// Plan builder template.
    pub research_plan: String,
    /// Query generator template.
    pub generate_queries: String,
    /// Response synthesizer template.
    pub response: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir` or config)
    /// 2. `DOCQA_PROMPT_DIR` environment variable
    /// 3. `~/.config/docqa/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("DOCQA_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            router: load_file(ROUTER_FILENAME, ROUTER_SYSTEM_PROMPT),
            research_plan: load_file(RESEARCH_PLAN_FILENAME, RESEARCH_PLAN_SYSTEM_PROMPT),
            generate_queries: load_file(GENERATE_QUERIES_FILENAME, GENERATE_QUERIES_SYSTEM_PROMPT),
            response: load_file(RESPONSE_FILENAME, RESPONSE_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            router: ROUTER_SYSTEM_PROMPT.to_string(),
            research_plan: RESEARCH_PLAN_SYSTEM_PROMPT.to_string(),
            generate_queries: GENERATE_QUERIES_SYSTEM_PROMPT.to_string(),
            response: RESPONSE_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten, so this is for initial scaffolding only.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (ROUTER_FILENAME, ROUTER_SYSTEM_PROMPT),
            (RESEARCH_PLAN_FILENAME, RESEARCH_PLAN_SYSTEM_PROMPT),
            (GENERATE_QUERIES_FILENAME, GENERATE_QUERIES_SYSTEM_PROMPT),
            (RESPONSE_FILENAME, RESPONSE_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

#[allow(clippy::expect_used)]
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex")
});

/// Substitutes `{name}` placeholders from `vars`.
///
/// `{{` and `}}` render as literal braces. Placeholders with no entry in
/// `vars` are left as written.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let whole = &caps[0];
            match caps.get(1) {
                Some(name) => vars
                    .iter()
                    .find(|(key, _)| *key == name.as_str())
                    .map_or_else(|| whole.to_string(), |(_, value)| (*value).to_string()),
                None if whole == "{{" => "{".to_string(),
                None => "}".to_string(),
            }
        })
        .into_owned()
}

/// Renders a collection list for the router prompt, one `- name` per line.
#[must_use]
pub fn collection_list(collections: &[String]) -> String {
    if collections.is_empty() {
        return "(no collections are loaded)".to_string();
    }
    collections
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Hello {name}", &[("name", "docs")], "Hello docs" ; "single placeholder")]
    #[test_case("{a}{b}{a}", &[("a", "1"), ("b", "2")], "121" ; "repeated placeholders")]
    #[test_case("keep {missing}", &[], "keep {missing}" ; "unknown placeholder left verbatim")]
    #[test_case("cite [${{number}}]", &[("number", "x")], "cite [${number}]" ; "escaped braces")]
    #[test_case("{\"steps\": []}", &[("steps", "x")], "{\"steps\": []}" ; "json braces untouched")]
    #[test_case("", &[("a", "1")], "" ; "empty template")]
    fn test_render_template(template: &str, vars: &[(&str, &str)], expected: &str) {
        assert_eq!(render_template(template, vars), expected);
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let rendered = render_template("{context}", &[("context", "{collections}")]);
        assert_eq!(rendered, "{collections}");
    }

    #[test]
    fn test_default_templates_have_placeholders() {
        assert!(ROUTER_SYSTEM_PROMPT.contains("{collection_list}"));
        assert!(GENERATE_QUERIES_SYSTEM_PROMPT.contains("{collections}"));
        assert!(RESPONSE_SYSTEM_PROMPT.contains("{collections}"));
        assert!(RESPONSE_SYSTEM_PROMPT.contains("{context}"));
    }

    #[test]
    fn test_response_prompt_citation_notation() {
        let rendered = render_template(RESPONSE_SYSTEM_PROMPT, &[("context", "C")]);
        assert!(rendered.contains("[${number}]"));
    }

    #[test]
    fn test_collection_list() {
        let list = collection_list(&["guides".to_string(), "api".to_string()]);
        assert_eq!(list, "- guides\n- api");
        assert!(collection_list(&[]).contains("no collections"));
    }

    #[test]
    fn test_load_falls_back_per_file() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(ROUTER_FILENAME), "custom router")
            .unwrap_or_else(|_| unreachable!());

        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.router, "custom router");
        assert_eq!(prompts.response, RESPONSE_SYSTEM_PROMPT);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(RESPONSE_FILENAME), "mine")
            .unwrap_or_else(|_| unreachable!());

        let written = PromptSet::write_defaults(dir.path()).unwrap_or_else(|_| unreachable!());
        assert_eq!(written.len(), 3);

        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.response, "mine");
        assert_eq!(prompts.router, ROUTER_SYSTEM_PROMPT);
    }
}
