use crate::extract::Document;

/// Prepared text shorter than this is not worth an embedding call
pub const MIN_EMBED_CHARS: usize = 50;

/// Headings included in the embedding text
const EMBED_HEADINGS: usize = 3;

/// Body words included in the embedding text
const EMBED_BODY_WORDS: usize = 500;

/// Builds the text that represents a document in the vector index
///
/// The title appears twice to weigh it above the body, followed by the meta
/// description, the first headings and the opening words of the body.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use site_indexer::extract::Document;
/// use site_indexer::pipeline::prepare_embedding_text;
///
/// let doc = Document {
///     id: "id".into(),
///     url: "https://example.org/".into(),
///     title: "Admissions".into(),
///     meta_description: "How to apply".into(),
///     body_text: "Applications   open in May".into(),
///     headings: vec!["Deadlines".into()],
///     category: "homepage".into(),
///     word_count: 4,
///     internal_links: vec![],
///     fetched_at: Utc::now(),
/// };
/// assert_eq!(
///     prepare_embedding_text(&doc),
///     "Admissions. Admissions. How to apply Deadlines Applications open in May"
/// );
/// ```
pub fn prepare_embedding_text(doc: &Document) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !doc.title.trim().is_empty() {
        parts.push(format!("{title}. {title}.", title = doc.title));
    }

    if !doc.meta_description.trim().is_empty() {
        parts.push(doc.meta_description.clone());
    }

    parts.extend(doc.headings.iter().take(EMBED_HEADINGS).cloned());

    if !doc.body_text.trim().is_empty() {
        let words: Vec<&str> = doc
            .body_text
            .split_whitespace()
            .take(EMBED_BODY_WORDS)
            .collect();
        parts.push(words.join(" "));
    }

    let combined = parts.join(" ");
    combined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns true if the prepared text is long enough to embed
pub fn is_embeddable(text: &str) -> bool {
    text.chars().count() >= MIN_EMBED_CHARS
}
