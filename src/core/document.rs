//! Documents and the corpus merge operation.
//!
//! [`DocumentCorpus`] is the accumulated, identity-deduplicated document
//! list for one conversation turn. It only changes through
//! [`DocumentCorpus::merge`], which applies a [`DocumentUpdate`]:
//!
//! - [`DocumentUpdate::Clear`] empties the corpus.
//! - Items without an identity get one derived from their content and
//!   metadata, so merging the same text twice is a no-op.
//! - Items whose identity is already present are dropped.
//! - Survivors are appended after existing items, in input order.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Open key-value metadata attached to a document.
pub type Metadata = serde_json::Map<String, Value>;

/// Namespace for content-derived document identities.
const DOCUMENT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a0e_5d3b_4c1a_9e8f_0b7d_2c4a_1e55);

/// Metadata key carrying a legacy identity in partial records.
const LEGACY_ID_KEY: &str = "uuid";

/// A retrievable unit of documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identity, the sole de-duplication key.
    pub id: String,
    /// Text content.
    pub content: String,
    /// Metadata; backends populate at least `source` and `title`.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Creates a document whose identity is derived from its content and metadata.
    #[must_use]
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        let content = content.into();
        let id = derive_id(&content, &metadata);
        Self {
            id,
            content,
            metadata,
        }
    }

    /// Creates a document with an explicit identity.
    #[must_use]
    pub fn with_id(id: impl Into<String>, content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }

    /// Source URL, if present.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    /// Title, if present.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }

    fn ensure_id(mut self) -> Self {
        if self.id.is_empty() {
            self.id = derive_id(&self.content, &self.metadata);
        }
        self
    }
}

/// A partial document record, typically decoded from JSON.
///
/// Accepts `page_content` as an alias for `content` and falls back to a
/// `metadata.uuid` entry when `id` is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Identity, if the producer assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Text content.
    #[serde(default, alias = "page_content")]
    pub content: String,
    /// Metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentRecord {
    /// Converts into a [`Document`], assigning an identity when missing.
    #[must_use]
    pub fn into_document(self) -> Document {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.metadata
                    .get(LEGACY_ID_KEY)
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| derive_id(&self.content, &self.metadata));
        Document {
            id,
            content: self.content,
            metadata: self.metadata,
        }
    }
}

/// One incoming item of a merge batch.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentInput {
    /// A full document. An empty identity counts as missing.
    Document(Document),
    /// Raw text without identity or metadata.
    Text(String),
    /// A partial record.
    Record(DocumentRecord),
}

impl DocumentInput {
    fn into_document(self) -> Document {
        match self {
            Self::Document(doc) => doc.ensure_id(),
            Self::Text(text) => Document::new(text, Metadata::new()),
            Self::Record(record) => record.into_document(),
        }
    }
}

impl From<Document> for DocumentInput {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

impl From<DocumentRecord> for DocumentInput {
    fn from(record: DocumentRecord) -> Self {
        Self::Record(record)
    }
}

impl From<String> for DocumentInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for DocumentInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// An update applied to a [`DocumentCorpus`].
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentUpdate {
    /// Reset the corpus to empty.
    Clear,
    /// A single raw string.
    Text(String),
    /// A batch of documents, strings, or records.
    Batch(Vec<DocumentInput>),
}

impl DocumentUpdate {
    /// Batch of full documents.
    #[must_use]
    pub fn documents(docs: impl IntoIterator<Item = Document>) -> Self {
        Self::Batch(docs.into_iter().map(DocumentInput::Document).collect())
    }

    /// Batch of raw strings.
    #[must_use]
    pub fn texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::Batch(
            texts
                .into_iter()
                .map(|t| DocumentInput::Text(t.into()))
                .collect(),
        )
    }

    /// Batch of partial records.
    #[must_use]
    pub fn records(records: impl IntoIterator<Item = DocumentRecord>) -> Self {
        Self::Batch(records.into_iter().map(DocumentInput::Record).collect())
    }
}

/// Ordered, identity-deduplicated document collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentCorpus {
    documents: Vec<Document>,
    ids: HashSet<String>,
}

impl DocumentCorpus {
    /// Creates an empty corpus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the corpus is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Whether a document with this identity is present.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Documents in corpus order.
    #[must_use]
    pub fn as_slice(&self) -> &[Document] {
        &self.documents
    }

    /// Iterates documents in corpus order.
    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    /// Consumes the corpus into its documents.
    #[must_use]
    pub fn into_vec(self) -> Vec<Document> {
        self.documents
    }

    /// Applies an update in place. Returns the number of documents appended.
    pub fn merge(&mut self, update: DocumentUpdate) -> usize {
        let inputs = match update {
            DocumentUpdate::Clear => {
                self.documents.clear();
                self.ids.clear();
                return 0;
            }
            DocumentUpdate::Text(text) => vec![DocumentInput::Text(text)],
            DocumentUpdate::Batch(items) => items,
        };

        let before = self.documents.len();
        for input in inputs {
            let doc = input.into_document();
            if self.ids.insert(doc.id.clone()) {
                self.documents.push(doc);
            }
        }
        self.documents.len() - before
    }
}

impl Serialize for DocumentCorpus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.documents.serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a DocumentCorpus {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

/// Functional form of [`DocumentCorpus::merge`]: returns the merged corpus.
#[must_use]
pub fn reduce_documents(mut existing: DocumentCorpus, update: DocumentUpdate) -> DocumentCorpus {
    existing.merge(update);
    existing
}

/// Derives a stable identity from content and metadata.
fn derive_id(content: &str, metadata: &Metadata) -> String {
    // Sort keys so the identity does not depend on map insertion order.
    let sorted: BTreeMap<&String, &Value> = metadata.iter().collect();
    let meta = serde_json::to_string(&sorted).unwrap_or_default();
    let mut name = Vec::with_capacity(content.len() + meta.len() + 1);
    name.extend_from_slice(content.as_bytes());
    name.push(0x1f);
    name.extend_from_slice(meta.as_bytes());
    Uuid::new_v5(&DOCUMENT_NAMESPACE, &name).to_string()
}

/// Formats documents as an XML block for the response prompt.
///
/// Each document carries its 1-based `index`, which is the number the
/// synthesizer cites as `[n]`. An empty slice yields `<documents></documents>`.
#[must_use]
pub fn format_documents(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "<documents></documents>".to_string();
    }

    let mut out = String::from("<documents>\n");
    for (i, doc) in docs.iter().enumerate() {
        let _ = write!(out, "<document index=\"{}\"", i + 1);
        let sorted: BTreeMap<&String, &Value> = doc.metadata.iter().collect();
        for (key, value) in sorted {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = write!(out, " {key}=\"{}\"", escape_attr(&rendered));
        }
        let _ = write!(out, ">\n{}\n</document>\n", doc.content);
    }
    out.push_str("</documents>");
    out
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
