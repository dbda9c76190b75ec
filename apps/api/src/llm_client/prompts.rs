// Shared prompt fragments. Stage-specific prompts live in pipeline/prompts.rs.

/// Output contract for any prompt whose response is parsed as a numbered list.
pub const NUMBERED_LIST_INSTRUCTION: &str = "\
    Respond with a numbered list only, one item per line, in the form \"1. <text>\". \
    Do NOT add headings, blank lines between items, or commentary before or after the list.";

/// Output contract for prompts whose response is parsed as a single JSON object.
pub const JSON_OBJECT_INSTRUCTION: &str = "\
    Respond with a single valid JSON object and nothing else. \
    Do NOT use markdown code fences. \
    Use \\n for line breaks inside JSON string values.";
