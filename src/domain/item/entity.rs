//! Searchable item entities

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a searchable item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Document,
    StructuredRecord,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::StructuredRecord => "structured_record",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "document" => Some(Self::Document),
            "structured_record" => Some(Self::StructuredRecord),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an item within a tenant: ids are only unique per kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub kind: ItemKind,
    pub id: String,
}

impl ItemKey {
    pub fn new(kind: ItemKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Unstructured document (brochure, article, FAQ page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub tenant_id: String,
    pub allowed_roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            allowed_roles: BTreeSet::new(),
            title: None,
            content: content.into(),
            content_type: content_type.into(),
            source_url: None,
            updated_at: None,
            embedding: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Structured record (property listing, price sheet row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub id: String,
    pub tenant_id: String,
    pub allowed_roles: BTreeSet<String>,
    pub name: String,
    pub content_type: String,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl StructuredRecord {
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        content_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            allowed_roles: BTreeSet::new(),
            name: name.into(),
            content_type: content_type.into(),
            fields: BTreeMap::new(),
            source_ref: None,
            updated_at: None,
            embedding: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// An item eligible for retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchableItem {
    Document(Document),
    StructuredRecord(StructuredRecord),
}

impl SearchableItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Document(_) => ItemKind::Document,
            Self::StructuredRecord(_) => ItemKind::StructuredRecord,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Document(d) => &d.id,
            Self::StructuredRecord(r) => &r.id,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.kind(), self.id())
    }

    pub fn tenant_id(&self) -> &str {
        match self {
            Self::Document(d) => &d.tenant_id,
            Self::StructuredRecord(r) => &r.tenant_id,
        }
    }

    pub fn allowed_roles(&self) -> &BTreeSet<String> {
        match self {
            Self::Document(d) => &d.allowed_roles,
            Self::StructuredRecord(r) => &r.allowed_roles,
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            Self::Document(d) => &d.content_type,
            Self::StructuredRecord(r) => &r.content_type,
        }
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Document(d) => d.updated_at,
            Self::StructuredRecord(r) => r.updated_at,
        }
    }

    /// Precomputed embedding, if any. Items without one are keyword-only.
    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            Self::Document(d) => d.embedding.as_deref(),
            Self::StructuredRecord(r) => r.embedding.as_deref(),
        }
    }

    pub fn set_embedding(&mut self, embedding: Vec<f32>) {
        match self {
            Self::Document(d) => d.embedding = Some(embedding),
            Self::StructuredRecord(r) => r.embedding = Some(embedding),
        }
    }

    /// Human-readable title
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Document(d) => d.title.as_deref(),
            Self::StructuredRecord(r) => Some(&r.name),
        }
    }

    /// Reference to where the item came from
    pub fn source_reference(&self) -> String {
        match self {
            Self::Document(d) => d
                .source_url
                .clone()
                .unwrap_or_else(|| format!("document:{}", d.id)),
            Self::StructuredRecord(r) => r
                .source_ref
                .clone()
                .unwrap_or_else(|| format!("record:{}", r.id)),
        }
    }

    /// Body text used for lexical matching and prompt rendering
    pub fn text(&self) -> String {
        match self {
            Self::Document(d) => match &d.title {
                Some(title) => format!("{}\n{}", title, d.content),
                None => d.content.clone(),
            },
            Self::StructuredRecord(r) => {
                let mut lines = vec![r.name.clone()];

                for (key, value) in &r.fields {
                    lines.push(format!("{}: {}", key, render_field(value)));
                }

                lines.join("\n")
            }
        }
    }

    /// Renders the item as an annotated block for the prompt context
    pub fn render(&self) -> String {
        let mut header = format!("({}, type: {}", self.kind(), self.content_type());

        if let Some(updated_at) = self.updated_at() {
            header.push_str(&format!(", updated: {}", updated_at.format("%Y-%m-%d")));
        }

        header.push_str(&format!(", source: {})", self.source_reference()));

        format!("{}\n{}", header, self.text())
    }

    pub fn is_visible_to(&self, tenant_id: &str, role: &str) -> bool {
        self.tenant_id() == tenant_id && self.allowed_roles().contains(role)
    }
}

impl From<Document> for SearchableItem {
    fn from(document: Document) -> Self {
        Self::Document(document)
    }
}

impl From<StructuredRecord> for SearchableItem {
    fn from(record: StructuredRecord) -> Self {
        Self::StructuredRecord(record)
    }
}

fn render_field(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn listing() -> SearchableItem {
        StructuredRecord::new("villa-mar", "t1", "property", "Villa Mar")
            .with_roles(["buyer", "agent"])
            .with_field("bedrooms", serde_json::json!(3))
            .with_field("price", serde_json::json!("290000 EUR"))
            .with_updated_at(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
            .into()
    }

    #[test]
    fn test_visibility_requires_tenant_and_role() {
        let item = listing();

        assert!(item.is_visible_to("t1", "buyer"));
        assert!(!item.is_visible_to("t1", "seller"));
        assert!(!item.is_visible_to("t2", "buyer"));
    }

    #[test]
    fn test_record_text_lists_fields() {
        let text = listing().text();
        assert_eq!(text, "Villa Mar\nbedrooms: 3\nprice: 290000 EUR");
    }

    #[test]
    fn test_render_annotations() {
        let rendered = listing().render();
        assert!(rendered.starts_with(
            "(structured_record, type: property, updated: 2026-03-01, source: record:villa-mar)"
        ));

        let doc: SearchableItem = Document::new("faq-1", "t1", "faq", "The pool opens at 8am.")
            .with_source_url("https://example.com/faq")
            .into();
        assert_eq!(
            doc.render(),
            "(document, type: faq, source: https://example.com/faq)\nThe pool opens at 8am."
        );
    }

    #[test]
    fn test_keys_distinguish_kinds() {
        let doc: SearchableItem = Document::new("same", "t1", "faq", "x").into();
        let rec: SearchableItem = StructuredRecord::new("same", "t1", "property", "x").into();

        assert_ne!(doc.key(), rec.key());
        assert_eq!(doc.key().to_string(), "document:same");
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(listing()).unwrap();
        assert_eq!(json["kind"], "structured_record");

        let back: SearchableItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, listing());
    }
}
