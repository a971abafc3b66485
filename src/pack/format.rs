//! Pure-function pack formatters: XML, JSON, and Markdown. None of
//! these touch the filesystem or the oracle; they only render an
//! already-assembled [`super::ContextPack`].

use serde::Serialize;

use super::{ContextPack, PackItem};

/// Output format for an assembled pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Xml,
    Json,
    Markdown,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(format!("unknown pack format: {other}")),
        }
    }
}

/// Renders `pack` in `format`.
#[must_use]
pub fn render(pack: &ContextPack, format: Format) -> String {
    match format {
        Format::Xml => format_xml(pack),
        Format::Json => format_json(pack),
        Format::Markdown => format_markdown(pack),
    }
}

/// Stable element order: `project-state`, `decisions`, `constraints`,
/// `active-tasks`, `plans`, `recent-context`, `instructions`.
#[must_use]
pub fn format_xml(pack: &ContextPack) -> String {
    let mut out = String::from("<context-pack>\n");

    if let Some(summary) = &pack.project_state {
        out.push_str(&format!(
            "  <project-state>{}</project-state>\n",
            escape_xml(summary)
        ));
    }
    if !pack.decisions.is_empty() {
        out.push_str("  <decisions>\n");
        for decision in &pack.decisions {
            out.push_str(&format!("    <decision>{}</decision>\n", escape_xml(decision)));
        }
        out.push_str("  </decisions>\n");
    }
    if !pack.constraints.is_empty() {
        out.push_str("  <constraints>\n");
        for constraint in &pack.constraints {
            out.push_str(&format!("    <constraint>{}</constraint>\n", escape_xml(constraint)));
        }
        out.push_str("  </constraints>\n");
    }
    if !pack.active_tasks.is_empty() {
        out.push_str("  <active-tasks>\n");
        for item in &pack.active_tasks {
            out.push_str(&format_xml_item(item));
        }
        out.push_str("  </active-tasks>\n");
    }
    if !pack.plans.is_empty() {
        out.push_str("  <plans>\n");
        for item in &pack.plans {
            out.push_str(&format_xml_item(item));
        }
        out.push_str("  </plans>\n");
    }
    if !pack.recent_context.is_empty() {
        out.push_str("  <recent-context>\n");
        for item in &pack.recent_context {
            out.push_str(&format_xml_item(item));
        }
        out.push_str("  </recent-context>\n");
    }
    out.push_str(&format!(
        "  <instructions>{}</instructions>\n",
        escape_xml(&pack.instructions)
    ));
    out.push_str("</context-pack>\n");
    out
}

fn format_xml_item(item: &PackItem) -> String {
    format!(
        "    <item id=\"{}\" source-type=\"{}\" session=\"{}\">{}</item>\n",
        escape_xml_attr(&item.id),
        item.source_type,
        escape_xml_attr(&item.session_id),
        escape_xml(&item.text)
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_xml_attr(s: &str) -> String {
    escape_xml(s).replace('"', "&quot;")
}

/// JSON mirror of [`ContextPack`]'s fields, same key names as the XML
/// element names (underscored rather than hyphenated, per JSON
/// convention).
#[derive(Serialize)]
struct JsonItem<'a> {
    id: &'a str,
    source_type: String,
    session: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct JsonPack<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_state: Option<&'a str>,
    decisions: &'a [String],
    constraints: &'a [String],
    active_tasks: Vec<JsonItem<'a>>,
    plans: Vec<JsonItem<'a>>,
    recent_context: Vec<JsonItem<'a>>,
    instructions: &'a str,
}

#[must_use]
pub fn format_json(pack: &ContextPack) -> String {
    fn to_json_items(items: &[PackItem]) -> Vec<JsonItem<'_>> {
        items
            .iter()
            .map(|item| JsonItem {
                id: &item.id,
                source_type: item.source_type.to_string(),
                session: &item.session_id,
                text: &item.text,
            })
            .collect()
    }
    let json_pack = JsonPack {
        project_state: pack.project_state.as_deref(),
        decisions: &pack.decisions,
        constraints: &pack.constraints,
        active_tasks: to_json_items(&pack.active_tasks),
        plans: to_json_items(&pack.plans),
        recent_context: to_json_items(&pack.recent_context),
        instructions: &pack.instructions,
    };
    serde_json::to_string_pretty(&json_pack).unwrap_or_else(|_| "{}".to_string())
}

/// Renders `pack` as Markdown with one `##` section per non-empty
/// field, in the same stable order as [`format_xml`].
#[must_use]
pub fn format_markdown(pack: &ContextPack) -> String {
    let mut out = String::new();

    if let Some(summary) = &pack.project_state {
        out.push_str("## Project State\n\n");
        out.push_str(summary);
        out.push_str("\n\n");
    }
    if !pack.decisions.is_empty() {
        out.push_str("## Decisions\n\n");
        for decision in &pack.decisions {
            out.push_str(&format!("- {decision}\n"));
        }
        out.push('\n');
    }
    if !pack.constraints.is_empty() {
        out.push_str("## Constraints\n\n");
        for constraint in &pack.constraints {
            out.push_str(&format!("- {constraint}\n"));
        }
        out.push('\n');
    }
    if !pack.active_tasks.is_empty() {
        out.push_str("## Active Tasks\n\n");
        for item in &pack.active_tasks {
            out.push_str(&format_markdown_item(item));
        }
    }
    if !pack.plans.is_empty() {
        out.push_str("## Plans\n\n");
        for item in &pack.plans {
            out.push_str(&format_markdown_item(item));
        }
    }
    if !pack.recent_context.is_empty() {
        out.push_str("## Recent Context\n\n");
        for item in &pack.recent_context {
            out.push_str(&format_markdown_item(item));
        }
    }
    out.push_str("## Instructions\n\n");
    out.push_str(&pack.instructions);
    out.push('\n');
    out
}

fn format_markdown_item(item: &PackItem) -> String {
    format!(
        "### {} ({}, {})\n\n{}\n\n",
        item.id, item.source_type, item.session_id, item.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SourceType;

    fn sample_pack() -> ContextPack {
        ContextPack {
            project_state: Some("the project is healthy".to_string()),
            decisions: vec!["use rayon for parallel scan".to_string()],
            constraints: vec!["never approximate the nearest-neighbor search".to_string()],
            active_tasks: vec![PackItem {
                id: "artifacts/1".to_string(),
                source_type: SourceType::Task,
                session_id: "artifacts".to_string(),
                text: "write the pack formatters".to_string(),
                token_count: 4,
            }],
            plans: vec![PackItem {
                id: "artifacts/0".to_string(),
                source_type: SourceType::Plan,
                session_id: "artifacts".to_string(),
                text: "plan body".to_string(),
                token_count: 2,
            }],
            recent_context: vec![PackItem {
                id: "s1/3".to_string(),
                source_type: SourceType::Session,
                session_id: "s1".to_string(),
                text: "recent excerpt".to_string(),
                token_count: 2,
            }],
            instructions: "carry on".to_string(),
            total_tokens: 42,
        }
    }

    #[test]
    fn xml_element_order_is_stable() {
        let xml = format_xml(&sample_pack());
        let project_state_pos = xml.find("<project-state>").unwrap();
        let decisions_pos = xml.find("<decisions>").unwrap();
        let constraints_pos = xml.find("<constraints>").unwrap();
        let tasks_pos = xml.find("<active-tasks>").unwrap();
        let plans_pos = xml.find("<plans>").unwrap();
        let recent_pos = xml.find("<recent-context>").unwrap();
        let instructions_pos = xml.find("<instructions>").unwrap();
        assert!(project_state_pos < decisions_pos);
        assert!(decisions_pos < constraints_pos);
        assert!(constraints_pos < tasks_pos);
        assert!(tasks_pos < plans_pos);
        assert!(plans_pos < recent_pos);
        assert!(recent_pos < instructions_pos);
    }

    #[test]
    fn xml_escapes_special_characters() {
        let mut pack = sample_pack();
        pack.decisions = vec!["a < b & c > d".to_string()];
        let xml = format_xml(&pack);
        assert!(xml.contains("a &lt; b &amp; c &gt; d"));
    }

    #[test]
    fn xml_item_carries_expected_attributes() {
        let xml = format_xml(&sample_pack());
        assert!(xml.contains(r#"id="artifacts/0""#));
        assert!(xml.contains(r#"source-type="plan""#));
        assert!(xml.contains(r#"session="artifacts""#));
    }

    #[test]
    fn json_round_trips_through_parser() {
        let json = format_json(&sample_pack());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["project_state"], "the project is healthy");
        assert_eq!(value["plans"][0]["source_type"], "plan");
    }

    #[test]
    fn markdown_includes_headers_for_nonempty_sections() {
        let markdown = format_markdown(&sample_pack());
        assert!(markdown.contains("## Project State"));
        assert!(markdown.contains("## Decisions"));
        assert!(markdown.contains("## Instructions"));
    }

    #[test]
    fn markdown_omits_headers_for_empty_sections() {
        let mut pack = sample_pack();
        pack.plans.clear();
        let markdown = format_markdown(&pack);
        assert!(!markdown.contains("## Plans"));
    }

    #[test]
    fn format_from_str_accepts_known_names() {
        assert_eq!("xml".parse::<Format>().unwrap(), Format::Xml);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("markdown".parse::<Format>().unwrap(), Format::Markdown);
        assert!("yaml".parse::<Format>().is_err());
    }
}
