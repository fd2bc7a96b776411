//! Answer synthesis under the grounding policy.
//!
//! The prompt restricts the model to the supplied context and names a fixed
//! refusal phrase for anything the context does not cover. An empty context
//! never reaches the provider: asking a model to answer from nothing risks
//! an ungrounded hallucination, so the refusal is returned directly.

use super::context::AssembledContext;
use crate::provider::{GenerateError, Generator};
use crate::types::Answer;
use std::collections::HashSet;
use std::sync::Arc;

/// The fixed refusal phrase the model is instructed to use, and the one the
/// grounding policy recognizes.
pub const REFUSAL_PHRASE: &str = "I don't know based on the document.";

/// Grounded answers whose content words overlap the context below this
/// fraction are logged as grounding violations.
const GROUNDING_OVERLAP_FLOOR: f64 = 0.3;

/// Formats grounded prompts, invokes the generation provider, and applies
/// the refusal policy to the result.
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Produce an answer for `question` grounded in `context`.
    ///
    /// Provider failures propagate as [`GenerateError`]; they are never
    /// converted into refusals, so callers can distinguish "no answer
    /// found" from "could not ask".
    pub async fn synthesize(
        &self,
        question: &str,
        context: &AssembledContext,
    ) -> Result<Answer, GenerateError> {
        if context.is_empty() {
            tracing::debug!(
                target: "answer",
                "no grounding context for {question:?}; refusing without a provider call"
            );
            return Ok(Answer::refusal());
        }

        let prompt = build_prompt(question, &context.text);
        let raw = self.generator.generate(&prompt).await?;
        let text = raw.trim().to_string();

        if is_refusal(&text) {
            return Ok(Answer {
                text,
                grounded: false,
                citations: Vec::new(),
            });
        }

        let overlap = lexical_overlap(&text, &context.text);
        if overlap < GROUNDING_OVERLAP_FLOOR {
            tracing::warn!(
                target: "answer",
                "grounding violation: answer overlaps context by only {overlap:.2} for {question:?}"
            );
        }

        Ok(Answer {
            text,
            grounded: true,
            citations: context.citations.clone(),
        })
    }
}

/// Build the grounded prompt.
fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a document-based assistant.\n\n\
         Answer the question strictly using the context below.\n\
         If the answer is not present, say:\n\
         \"{REFUSAL_PHRASE}\"\n\n\
         Context:\n{context}\n\n\
         Question:\n{question}\n"
    )
}

/// Whether the provider's reply matches the refusal phrase, under a
/// normalized comparison so formatting differences do not flip the flag.
fn is_refusal(text: &str) -> bool {
    normalize(text) == normalize(REFUSAL_PHRASE)
}

/// Lowercase, collapse whitespace, strip surrounding quotes and trailing
/// punctuation.
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim_end_matches(['.', '!'])
        .to_string()
}

/// Fraction of the answer's content words that appear in the context.
fn lexical_overlap(answer: &str, context: &str) -> f64 {
    let context_words: HashSet<String> = words(context).collect();
    let answer_words: Vec<String> = words(answer).collect();
    if answer_words.is_empty() {
        return 1.0;
    }

    let hits = answer_words
        .iter()
        .filter(|w| context_words.contains(*w))
        .count();
    hits as f64 / answer_words.len() as f64
}

/// Content words: alphanumeric tokens of four or more characters.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 4)
        .map(|t| t.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockFailure, MockGenerator};
    use crate::types::ChunkId;

    fn context(text: &str, ids: &[u32]) -> AssembledContext {
        AssembledContext {
            text: text.to_string(),
            citations: ids.iter().map(|i| ChunkId::from_u32(*i).unwrap()).collect(),
            dropped: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_context_refuses_without_provider_call() {
        let generator = Arc::new(MockGenerator::with_responses(vec!["should not be used"]));
        let synthesizer = AnswerSynthesizer::new(generator.clone());

        let answer = synthesizer
            .synthesize("What is Alice's salary?", &AssembledContext::default())
            .await
            .unwrap();

        assert_eq!(answer, Answer::refusal());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_grounded_answer_carries_citations() {
        let generator = Arc::new(MockGenerator::with_responses(vec!["Bob is a doctor."]));
        let synthesizer = AnswerSynthesizer::new(generator.clone());

        let answer = synthesizer
            .synthesize(
                "What is Bob's job?",
                &context("Page 1:\nBob is a doctor.", &[1, 2]),
            )
            .await
            .unwrap();

        assert!(answer.grounded);
        assert_eq!(answer.text, "Bob is a doctor.");
        assert_eq!(answer.citations.len(), 2);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_refusal_reply_clears_citations() {
        let generator = Arc::new(MockGenerator::refusing());
        let synthesizer = AnswerSynthesizer::new(generator);

        let answer = synthesizer
            .synthesize(
                "What is Alice's salary?",
                &context("Page 1:\nAlice is a engineer.", &[1]),
            )
            .await
            .unwrap();

        assert!(!answer.grounded);
        assert!(answer.citations.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_is_not_a_refusal() {
        let generator = Arc::new(MockGenerator::failing(MockFailure::Timeout));
        let synthesizer = AnswerSynthesizer::new(generator);

        let err = synthesizer
            .synthesize("question", &context("some context", &[1]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Timeout));
    }

    #[test]
    fn test_refusal_matching_is_normalized() {
        assert!(is_refusal("I don't know based on the document."));
        assert!(is_refusal("  I DON'T KNOW based on the document  "));
        assert!(is_refusal("\"I don't know based on the document.\""));
        assert!(!is_refusal("Bob is a doctor."));
        assert!(!is_refusal(
            "I don't know based on the document, but my guess is..."
        ));
    }

    #[test]
    fn test_prompt_contains_context_question_and_refusal() {
        let prompt = build_prompt("What is Bob's job?", "Page 1:\nBob is a doctor.");
        assert!(prompt.contains(REFUSAL_PHRASE));
        assert!(prompt.contains("Page 1:\nBob is a doctor."));
        assert!(prompt.contains("What is Bob's job?"));
        // The restriction must come before the context it governs.
        assert!(prompt.find("strictly").unwrap() < prompt.find("Context:").unwrap());
    }

    #[test]
    fn test_lexical_overlap() {
        assert!(lexical_overlap("Bob is a doctor", "Bob is a doctor and more") > 0.9);
        assert!(lexical_overlap("quantum entanglement theory", "Bob is a doctor") < 0.1);
    }
}
