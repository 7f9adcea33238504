//! Prompt templates for the caller-facing operations.
//!
//! Keeping every prompt here means the wording can change without touching
//! the retry or interpretation logic, and tests can inspect prompts directly.

/// Default instruction for [`crate::assistant::Assistant::analyze`] when the
/// caller passes an empty prompt.
pub const DEFAULT_ANALYZE_PROMPT: &str = "Describe this content in detail: subjects, composition, colours, lighting, any visible text, and overall quality.";

/// Default template for [`crate::assistant::Assistant::structured_suggestion`].
pub const DEFAULT_SUGGESTION_TEMPLATE: &str = r#"You are a photo editor. Look at the image and propose the single most valuable edit.

Respond with JSON only, no prose, in exactly this shape:
{"action": "<resize|crop|enhance|filter|transform>", "parameters": { ... }, "explanation": "<one sentence>"}"#;

/// Parameter reference shared by every prompt that asks for an instruction.
pub const INSTRUCTION_SCHEMA: &str = r#"Allowed actions and their parameters:
- resize:    {"width": <px>, "height": <px>, "fit": "cover|contain|fill|inside|outside"}  (width or height required)
- crop:      {"x": <px>, "y": <px>, "width": <px>, "height": <px>}  or  {"aspectRatio": "16:9|4:3|1:1"}
- enhance:   {"brightness": <multiplier>, "contrast": <multiplier>, "saturation": <multiplier>, "sharpen": true|false}  (1.0 = unchanged)
- filter:    {"type": "grayscale|sepia|blur|vintage"}
- transform: {"rotate": <degrees>}  or  {"flip": "horizontal|vertical"}"#;

/// Build the prompt that turns a user's free-text request into one instruction.
pub fn plan_edit_prompt(user_prompt: &str) -> String {
    format!(
        "You are an image-editing planner. Convert the user's request into exactly one edit.\n\n\
         {INSTRUCTION_SCHEMA}\n\n\
         Respond with JSON only, no prose, in exactly this shape:\n\
         {{\"action\": \"...\", \"parameters\": {{ ... }}, \"explanation\": \"<one sentence>\"}}\n\n\
         User request: \"\"\"{}\"\"\"",
        user_prompt.trim()
    )
}

/// Append the parameter reference to a caller-supplied suggestion template.
pub fn suggestion_prompt(template: &str) -> String {
    format!("{}\n\n{INSTRUCTION_SCHEMA}", template.trim())
}
