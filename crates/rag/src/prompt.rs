use index::RetrievalHit;

/// Fixed system instruction for every generation call.
pub const SYSTEM_PROMPT: &str = "You are an MCC PDMS plant assistant. Answer based only on the \
provided SOPs/manuals/QC/incident context and batch info, in a concise way.";

/// Render retrieved chunks as labelled knowledge-base entries, best first.
pub fn format_context(hits: &[RetrievalHit]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "Document: {} [type={}]\n{}",
                hit.chunk.document.title, hit.chunk.document.doc_type, hit.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the user message. An empty `batch_context` is omitted.
pub fn build_user_prompt(question: &str, batch_context: Option<&str>, hits: &[RetrievalHit]) -> String {
    let mut prompt = format!("Question: {question}\n\n");
    if let Some(context) = batch_context.filter(|c| !c.is_empty()) {
        prompt.push_str("Batch context:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Knowledge base:\n");
    prompt.push_str(&format_context(hits));
    prompt.push_str("\n\nAnswer clearly:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::hit;
    use index::DocType;

    #[test]
    fn prompt_without_batch_context() {
        let hits = vec![hit(1, "Dryer SOP", DocType::Sop, "Hold at 80C.", 0.9)];
        let prompt = build_user_prompt("How hot?", None, &hits);
        assert_eq!(
            prompt,
            "Question: How hot?\n\nKnowledge base:\nDocument: Dryer SOP [type=SOP]\nHold at 80C.\n\nAnswer clearly:"
        );
    }

    #[test]
    fn prompt_with_batch_context_and_two_chunks() {
        let hits = vec![
            hit(1, "Dryer SOP", DocType::Sop, "Hold at 80C.", 0.9),
            hit(2, "Line 3 incident", DocType::Incident, "Fan tripped.", 0.4),
        ];
        let prompt = build_user_prompt(
            "Why wet?",
            Some("Batch B-17 status=HOLD, raw=ragi, qc_count=2"),
            &hits,
        );
        assert!(prompt.starts_with(
            "Question: Why wet?\n\nBatch context:\nBatch B-17 status=HOLD, raw=ragi, qc_count=2\n\nKnowledge base:\n"
        ));
        assert!(prompt.contains(
            "Hold at 80C.\n\nDocument: Line 3 incident [type=INCIDENT]\nFan tripped."
        ));
        assert!(prompt.ends_with("\n\nAnswer clearly:"));
    }

    #[test]
    fn empty_batch_context_is_dropped() {
        let prompt = build_user_prompt("q", Some(""), &[]);
        assert!(!prompt.contains("Batch context"));
        assert_eq!(prompt, "Question: q\n\nKnowledge base:\n\n\nAnswer clearly:");
    }
}
