pub mod choices;
pub mod classify;
pub mod normalize;
pub mod prose;

use crate::store::NodeType;
use choices::ExtractedChoice;

/// A section parsed from page text, before graph repair mints final node
/// ids. Choice destinations stay numeric and may dangle at this stage.
#[derive(Debug, Clone)]
pub struct SectionDraft {
    pub section_number: u32,
    pub title: String,
    pub text: String,
    pub node_type: NodeType,
    pub choices: Vec<ExtractedChoice>,
}

/// Four-pass pipeline over normalized page text: choices → prose → title
/// → node type.
pub fn parse_section(section_number: u32, normalized: &str, fallback_text: &str) -> SectionDraft {
    let choices = choices::extract_choices(normalized);
    let text = prose::clean_prose(normalized, section_number, fallback_text);
    let title = classify::infer_title(section_number, &text);
    let node_type = classify::infer_node_type(&text, !choices.is_empty());
    SectionDraft {
        section_number,
        title,
        text,
        node_type,
        choices,
    }
}
