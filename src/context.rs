//! Budget-bounded context assembly from ranked search results.

use crate::store::EmbeddingRecord;

/// Packs ranked chunks into a single text blob under a character budget.
///
/// Packing is greedy and rank-respecting: blocks are appended in input order
/// (highest similarity first), and the first block that would push the total
/// past the budget stops assembly outright. Lower-ranked blocks are never
/// substituted for a skipped one, so the output is always a prefix of the
/// ranked list and a high-relevance chunk is never demoted in favor of a
/// smaller, less relevant one.
#[derive(Clone, Copy, Debug)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    /// Creates an assembler with the given character budget.
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Character budget applied by [`ContextAssembler::assemble`].
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Renders ranked results into headed blocks and packs them under the
    /// budget. Empty input yields an empty string; callers substitute their
    /// own "no context" fallback.
    pub fn assemble(&self, results: &[(EmbeddingRecord, f32)]) -> String {
        let mut context = String::new();

        for (position, (record, similarity)) in results.iter().enumerate() {
            let block = render_block(position + 1, record, *similarity);
            // The separator counts against the budget too, so the bound on
            // the final string is exact.
            let addition = if context.is_empty() {
                block.len()
            } else {
                block.len() + 1
            };
            if context.len() + addition > self.max_chars {
                break;
            }
            if !context.is_empty() {
                context.push('\n');
            }
            context.push_str(&block);
        }

        context
    }
}

/// One self-contained context block: a header naming the source and its
/// relevance, a dashed underline, then the chunk text.
fn render_block(position: usize, record: &EmbeddingRecord, similarity: f32) -> String {
    let header = format!(
        "Document {}: {} (Relevance: {:.2})",
        position,
        record.label(),
        similarity
    );
    format!("{header}\n{}\n{}\n", "-".repeat(header.len()), record.content_chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64, document_id: i64, chunk: &str) -> EmbeddingRecord {
        EmbeddingRecord {
            id,
            document_id,
            chunk_index: 0,
            content_chunk: chunk.to_string(),
            metadata: crate::types::Metadata::new(),
            created_at: Utc::now(),
        }
    }

    fn named_record(id: i64, filename: &str, chunk: &str) -> EmbeddingRecord {
        let mut rec = record(id, id, chunk);
        rec.metadata
            .insert("filename".into(), serde_json::Value::String(filename.into()));
        rec
    }

    #[test]
    fn empty_results_yield_empty_context() {
        let assembler = ContextAssembler::new(1000);
        assert_eq!(assembler.assemble(&[]), "");
    }

    #[test]
    fn blocks_carry_header_and_text_in_rank_order() {
        let assembler = ContextAssembler::new(10_000);
        let results = vec![
            (named_record(1, "diabetes.txt", "Diabetes is a chronic condition."), 0.91),
            (named_record(2, "weather.txt", "Weather today is mild."), 0.42),
        ];

        let context = assembler.assemble(&results);
        assert!(context.starts_with("Document 1: diabetes.txt (Relevance: 0.91)"));
        assert!(context.contains("Document 2: weather.txt (Relevance: 0.42)"));
        assert!(
            context.find("diabetes.txt").unwrap() < context.find("weather.txt").unwrap(),
            "rank order must be preserved"
        );
    }

    #[test]
    fn header_falls_back_to_document_id() {
        let assembler = ContextAssembler::new(10_000);
        let context = assembler.assemble(&[(record(7, 42, "some text"), 0.5)]);
        assert!(context.starts_with("Document 1: Document 42 (Relevance: 0.50)"));
    }

    #[test]
    fn budget_is_a_hard_upper_bound() {
        // First block ~300 chars rendered, second ~250: under a 400-char
        // budget only the first may appear.
        let first = record(1, 1, &"a".repeat(250));
        let second = record(2, 2, &"b".repeat(200));
        let assembler = ContextAssembler::new(400);

        let context = assembler.assemble(&[(first, 0.9), (second, 0.8)]);
        assert!(context.len() <= 400, "got {}", context.len());
        assert!(context.contains('a'));
        assert!(!context.contains('b'));
    }

    #[test]
    fn overflow_stops_assembly_even_when_later_blocks_would_fit() {
        let big = record(1, 1, &"x".repeat(500));
        let small = record(2, 2, "tiny");
        let assembler = ContextAssembler::new(120);

        // The big block overflows; the small one would fit on its own but
        // must not be promoted past it.
        let context = assembler.assemble(&[(big, 0.9), (small, 0.8)]);
        assert_eq!(context, "");
    }

    #[test]
    fn packed_context_is_longest_fitting_prefix() {
        let results: Vec<_> = (1..=5)
            .map(|i| (record(i, i, &"c".repeat(40)), 1.0 - i as f32 * 0.1))
            .collect();
        let budget = 250;
        let unlimited = ContextAssembler::new(usize::MAX);

        let context = ContextAssembler::new(budget).assemble(&results);
        assert!(context.len() <= budget);

        let packed = context.matches("(Relevance:").count();
        assert!(packed < results.len(), "budget should cut the list short");
        // Exactly the first `packed` blocks, byte for byte.
        assert_eq!(context, unlimited.assemble(&results[..packed]));
        // One more block would overflow, so the prefix is maximal.
        assert!(unlimited.assemble(&results[..packed + 1]).len() > budget);
    }
}
