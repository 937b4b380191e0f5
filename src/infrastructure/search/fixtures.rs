//! Shared test items for a small real-estate tenant

use crate::domain::embedding::MockEmbeddingProvider;
use crate::domain::item::{Document, SearchableItem, StructuredRecord};

pub const TENANT: &str = "costa-homes";
pub const OTHER_TENANT: &str = "other-tenant";

/// Query matching the brochure, the buying guide and the Villa Mar listing
pub const VILLA_QUERY: &str = "3 bedroom villa under 300k";

/// Items embedded with the mock provider so vector and keyword search agree
pub fn items() -> Vec<SearchableItem> {
    let items: Vec<SearchableItem> = vec![
        StructuredRecord::new("villa-mar", TENANT, "property", "Villa Mar")
            .with_roles(["buyer", "agent"])
            .with_field("bedrooms", serde_json::json!("3 bedroom"))
            .with_field("type", serde_json::json!("villa"))
            .with_field("price", serde_json::json!("290000 EUR, under 300k"))
            .into(),
        Document::new(
            "villa-mar-brochure",
            TENANT,
            "brochure",
            "Villa Mar is a 3 bedroom villa with sea views and a private pool.",
        )
        .with_roles(["buyer", "agent"])
        .with_title("Villa Mar brochure")
        .into(),
        Document::new(
            "buying-guide",
            TENANT,
            "article",
            "Buying a villa under 300k: what a 3 bedroom budget gets you on the coast.",
        )
        .with_roles(["buyer"])
        .into(),
        Document::new(
            "pool-faq",
            TENANT,
            "faq",
            "The community pool opens at 8am and closes at 10pm.",
        )
        .with_roles(["buyer", "agent"])
        .into(),
        Document::new(
            "agent-commission",
            TENANT,
            "policy",
            "Agent commission on any villa sale is 3 percent, paid on completion.",
        )
        .with_roles(["agent"])
        .into(),
        Document::new(
            "rival-villa",
            OTHER_TENANT,
            "brochure",
            "A 3 bedroom villa under 300k from another agency.",
        )
        .with_roles(["buyer"])
        .into(),
    ];

    items
        .into_iter()
        .map(|mut item| {
            item.set_embedding(MockEmbeddingProvider::vector_for(&item.text()));
            item
        })
        .collect()
}

/// Ids of the buyer-visible items the villa query should surface
pub fn villa_matches() -> [&'static str; 3] {
    ["villa-mar", "villa-mar-brochure", "buying-guide"]
}
