//! Budget-bounded grounding context assembly.
//!
//! Passages are kept in retrieval-rank order so truncation drops the least
//! relevant material first. Each passage is labeled with its source page
//! for citation. Truncation is silent toward the caller but observable in
//! the logs.

use crate::types::{ChunkId, ScoredChunk};

/// A grounding context plus the chunks it actually includes.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    /// Concatenated, page-labeled passages. Empty when nothing fit or
    /// nothing was retrieved.
    pub text: String,

    /// Ids of the included passages, in rank order. Always a prefix of the
    /// ranked input.
    pub citations: Vec<ChunkId>,

    /// Ids of passages that were retrieved but did not fit the budget.
    pub dropped: Vec<ChunkId>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Separator between passages.
const PASSAGE_SEPARATOR: &str = "\n\n";

/// Assemble ranked passages into a context no larger than
/// `max_context_chars` characters.
///
/// Passages are added in rank order until adding the next would exceed the
/// budget; everything after that point is dropped and logged.
pub fn assemble(results: &[ScoredChunk], max_context_chars: usize) -> AssembledContext {
    let mut context = AssembledContext::default();
    let mut used_chars = 0usize;
    let mut included = 0usize;

    for scored in results {
        let block = format!("Page {}:\n{}", scored.chunk.page, scored.chunk.text);
        let block_chars = block.chars().count();
        let separator_chars = if included > 0 {
            PASSAGE_SEPARATOR.len()
        } else {
            0
        };

        if used_chars + separator_chars + block_chars > max_context_chars {
            break;
        }

        if included > 0 {
            context.text.push_str(PASSAGE_SEPARATOR);
        }
        context.text.push_str(&block);
        context.citations.push(scored.chunk.id);
        used_chars += separator_chars + block_chars;
        included += 1;
    }

    if included < results.len() {
        context.dropped = results[included..].iter().map(|r| r.chunk.id).collect();
        let dropped: Vec<String> = context.dropped.iter().map(ChunkId::to_string).collect();
        tracing::debug!(
            target: "retrieval",
            "context budget {max_context_chars} reached: dropped {} passage(s) [{}]",
            dropped.len(),
            dropped.join(", ")
        );
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn scored(id: u32, page: u32, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: ChunkId::from_u32(id).unwrap(),
                text: text.to_string(),
                page,
                char_range: (0, text.len()),
            },
            score,
        }
    }

    #[test]
    fn test_empty_results_give_empty_context() {
        let context = assemble(&[], 1000);
        assert!(context.is_empty());
        assert!(context.citations.is_empty());
    }

    #[test]
    fn test_passages_labeled_with_pages() {
        let context = assemble(
            &[scored(1, 2, "Bob is a doctor.", 0.9)],
            1000,
        );
        assert_eq!(context.text, "Page 2:\nBob is a doctor.");
        assert_eq!(context.citations.len(), 1);
    }

    #[test]
    fn test_never_exceeds_budget() {
        let results = vec![
            scored(1, 1, &"a".repeat(50), 0.9),
            scored(2, 1, &"b".repeat(50), 0.8),
            scored(3, 1, &"c".repeat(50), 0.7),
        ];

        for budget in [10, 60, 120, 500] {
            let context = assemble(&results, budget);
            assert!(
                context.text.chars().count() <= budget,
                "context {} chars exceeds budget {budget}",
                context.text.chars().count()
            );
        }
    }

    #[test]
    fn test_citations_are_rank_prefix() {
        let results = vec![
            scored(7, 1, &"a".repeat(40), 0.9),
            scored(2, 1, &"b".repeat(40), 0.8),
            scored(5, 1, &"c".repeat(40), 0.7),
        ];

        // Budget fits roughly two labeled passages.
        let context = assemble(&results, 105);
        let ids: Vec<u32> = context.citations.iter().map(|c| c.value()).collect();
        assert_eq!(ids, vec![7, 2]);

        // The truncated passage is exposed, not silently lost.
        let dropped: Vec<u32> = context.dropped.iter().map(|c| c.value()).collect();
        assert_eq!(dropped, vec![5]);
    }

    #[test]
    fn test_all_fit_keeps_everything() {
        let results = vec![
            scored(1, 1, "first passage", 0.9),
            scored(2, 2, "second passage", 0.8),
        ];
        let context = assemble(&results, 1000);
        assert_eq!(context.citations.len(), 2);
        assert!(context.text.contains("Page 1:\nfirst passage"));
        assert!(context.text.contains("Page 2:\nsecond passage"));
    }
}
