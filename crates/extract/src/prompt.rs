pub fn build_extraction_prompt(history: &str, input: &str) -> String {
    let history = if history.is_empty() { "(none)" } else { history };
    format!(
        r#"Extract every named entity from the text below.

INSTRUCTIONS:
1. Identify entities: people, places, organizations, objects, concepts, events
2. For each entity collect its attributes, the events it takes part in and its relations to other entities
3. Choose the entity type freely (e.g. person, device, chemical, organization, regulation)
4. Keep names, attribute keys and values in the language of the text
5. If the input starts with a prior summary, use it only to resolve references in the current chunk

SCHEMA (a JSON object whose "entities" array holds one object per entity):
{{"entities": [
  {{"name": "EntityName", "type": "free-form type", "attributes": {{"key": "value"}}, "events": [{{"time": "...", "action": "...", "object": "..."}}], "relations": [{{"relation": "...", "target": "OtherEntity"}}]}}
]}}

RULES:
- Output ONLY the JSON object, no markdown, no explanations
- Use the same name for the same entity every time it appears
- Use empty objects/arrays when nothing is known

CONVERSATION SO FAR:
{}

TEXT:
{}

JSON OUTPUT:"#,
        history, input
    )
}

pub fn build_memory_summary_prompt(input: &str) -> String {
    format!(
        r#"Summarize the entity-relevant content of the text below so that a later reader can interpret the next part of the document.

Keep: who and what appears, their attributes, what happened to them and how they relate.
Drop: style, filler and anything not about an entity.
Write plain text, at most a few sentences, in the language of the text.

TEXT:
{}

SUMMARY:"#,
        input
    )
}

pub fn build_consistency_prompt(entity_json: &str) -> String {
    format!(
        r#"You are checking one entity extracted from a document for internal contradictions.

Look at its attributes, events and relations and decide whether any of them contradict each other
(e.g. two incompatible locations at the same time, an event before the entity existed).

ENTITY:
{}

Output ONLY a JSON object with this schema:
{{"conflict": true|false, "reason": "short explanation", "conflicting_fields": ["..."]}}"#,
        entity_json
    )
}

pub fn build_correction_prompt(chunk: &str, conflicts: &str) -> String {
    format!(
        r#"The document passage below may contain statements involved in the listed entity conflicts.

CONFLICTS:
{}

PASSAGE:
{}

Rewrite the passage so that the conflicts are resolved, changing as little as possible.
If the passage is not involved in any conflict, return it unchanged.
Output only the rewritten passage."#,
        conflicts, chunk
    )
}

pub fn build_grammar_prompt(chunk: &str) -> String {
    format!(
        r#"Check the following text for grammatical errors (misused prepositions, redundant or missing constituents, wrong collocations).

TEXT:
{}

Output ONLY a JSON object with this schema:
{{"correct": true|false, "content": "the corrected text (or the original if correct)", "reason": "what was wrong, empty if correct"}}"#,
        chunk
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_embeds_input_and_history() {
        let prompt = build_extraction_prompt("user: earlier", "小明在北京工作。");
        assert!(prompt.contains("小明在北京工作。"));
        assert!(prompt.contains("user: earlier"));

        let prompt = build_extraction_prompt("", "x");
        assert!(prompt.contains("(none)"));
    }

    #[test]
    fn test_extraction_prompt_asks_for_entities_object() {
        // JSON mode only yields objects, so the schema must be one.
        let prompt = build_extraction_prompt("", "x");
        assert!(prompt.contains(r#"{"entities": ["#));
        assert!(!prompt.contains("JSON array"));
    }

    #[test]
    fn test_correction_prompt_embeds_both_parts() {
        let prompt = build_correction_prompt("原文", "[{\"conflict\": true}]");
        assert!(prompt.contains("原文"));
        assert!(prompt.contains("\"conflict\": true"));
    }
}
