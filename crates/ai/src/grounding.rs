//! Grounding metadata adapter.
//!
//! Grounded completions carry citation chunks in the candidate's
//! `groundingMetadata`. Only web chunks are meaningful to callers.

use serde_json::Value;

use crate::types::GroundingChunk;

/// Extract citation chunks from a candidate's grounding metadata.
///
/// Absent or unexpected metadata yields an empty list. Chunks without a web
/// source are kept with an empty URI; use [`web_sources`] before rendering.
pub fn grounding_chunks(metadata: Option<&Value>) -> Vec<GroundingChunk> {
    let Some(chunks) = metadata
        .and_then(|m| m.get("groundingChunks"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    chunks
        .iter()
        .map(|chunk| {
            let web = chunk.get("web");
            let field = |name: &str| {
                web.and_then(|w| w.get(name))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            GroundingChunk::new(field("uri"), field("title"))
        })
        .collect()
}

/// Chunks with a non-empty source URI, in their original order.
pub fn web_sources(chunks: &[GroundingChunk]) -> Vec<GroundingChunk> {
    chunks
        .iter()
        .filter(|chunk| !chunk.source_uri.trim().is_empty())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_metadata_is_empty() {
        assert!(grounding_chunks(None).is_empty());
        assert!(grounding_chunks(Some(&json!({}))).is_empty());
        assert!(grounding_chunks(Some(&json!({"groundingChunks": "nope"}))).is_empty());
    }

    #[test]
    fn test_extracts_web_chunks() {
        let metadata = json!({
            "webSearchQueries": ["weather paris"],
            "groundingChunks": [
                {"web": {"uri": "https://a.example", "title": "A"}},
                {"retrievedContext": {"uri": "gs://bucket/doc"}},
                {"web": {"uri": "https://b.example"}}
            ]
        });

        let chunks = grounding_chunks(Some(&metadata));
        assert_eq!(
            chunks,
            vec![
                GroundingChunk::new("https://a.example", "A"),
                GroundingChunk::new("", ""),
                GroundingChunk::new("https://b.example", ""),
            ]
        );
    }

    #[test]
    fn test_web_sources_filters_and_preserves_order() {
        let chunks = vec![
            GroundingChunk::new("https://a", "A"),
            GroundingChunk::new("", "no uri"),
            GroundingChunk::new("https://b", "B"),
            GroundingChunk::new("  ", "blank"),
            GroundingChunk::new("https://c", "C"),
        ];

        let sources = web_sources(&chunks);
        let uris: Vec<_> = sources.iter().map(|c| c.source_uri.as_str()).collect();
        assert_eq!(uris, vec!["https://a", "https://b", "https://c"]);
    }
}
