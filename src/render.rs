//! Pure projections from settled answers to display text.

use pulldown_cmark::{Event, Parser, Tag};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use crate::conversation::{Answer, ResultSet};

/// Shown in place of a cell that is null or absent from its row.
pub const MISSING_CELL: &str = "N/A";

pub const SHOW_REASONING: &str = "Show Thinking Process >";
pub const HIDE_REASONING: &str = "Hide Thinking Process ᐯ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultView {
    /// No column information: never drawn as an empty table.
    NoData,
    Table(Table),
}

/// Lay out a result set by its declared columns.
pub fn render_result(result: Option<&ResultSet>) -> ResultView {
    let Some(result) = result.filter(|r| !r.columns.is_empty()) else {
        return ResultView::NoData;
    };

    let rows = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|column| format_cell(row.get(column)))
                .collect()
        })
        .collect();

    ResultView::Table(Table {
        columns: result.columns.clone(),
        rows,
    })
}

pub fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING_CELL.to_string(),
        Some(Value::String(s)) => s.clone(),
        // objects and arrays come out as compact JSON
        Some(value) => value.to_string(),
    }
}

impl Table {
    /// Render as a fixed-width text grid for a monospace font.
    pub fn to_text(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.width()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.width());
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| {
                    let pad = width.saturating_sub(cell.width());
                    format!("{cell}{}", " ".repeat(pad))
                })
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = line(&self.columns);
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &self.rows {
            out.push('\n');
            out.push_str(&line(row));
        }
        out
    }
}

/// The reasoning toggle for an answer, if it has any reasoning at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningDisclosure {
    pub label: &'static str,
    /// The full trace, only when expanded.
    pub body: Option<String>,
}

pub fn reasoning_disclosure(answer: &Answer) -> Option<ReasoningDisclosure> {
    if answer.reasoning.is_empty() {
        return None;
    }
    if answer.details_visible {
        Some(ReasoningDisclosure {
            label: HIDE_REASONING,
            body: Some(markdown_to_text(&answer.reasoning.join("\n"))),
        })
    } else {
        Some(ReasoningDisclosure {
            label: SHOW_REASONING,
            body: None,
        })
    }
}

/// Flatten markdown into readable plain text: headings and paragraphs become
/// blocks, list items get bullets or numbers, code keeps its content.
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();
    let mut lists: Vec<Option<u64>> = Vec::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Item) => {
                let depth = lists.len().saturating_sub(1);
                out.push_str(&"  ".repeat(depth));
                match lists.last_mut() {
                    Some(Some(n)) => {
                        out.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => out.push_str("• "),
                }
            }
            Event::Start(Tag::List(start)) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                lists.push(start);
            }
            Event::End(Tag::List(_)) => {
                lists.pop();
                if lists.is_empty() {
                    out.push('\n');
                }
            }
            Event::End(Tag::Item) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::End(Tag::Paragraph) => {
                if lists.is_empty() {
                    out.push_str("\n\n");
                }
            }
            Event::End(Tag::Heading(..)) | Event::End(Tag::CodeBlock(_)) => out.push_str("\n\n"),
            // Raw HTML is kept verbatim; SQL comparisons like `a<b AND c>d` parse as tags.
            Event::Text(text) | Event::Code(text) | Event::Html(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Rule => out.push_str("---\n\n"),
            _ => {}
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_set(value: Value) -> ResultSet {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_no_columns_renders_placeholder() {
        assert_eq!(render_result(None), ResultView::NoData);

        let empty = result_set(json!({"columns": [], "data": []}));
        assert_eq!(render_result(Some(&empty)), ResultView::NoData);

        let rows_only = result_set(json!({"data": [{"x": 1}]}));
        assert_eq!(render_result(Some(&rows_only)), ResultView::NoData);
    }

    #[test]
    fn test_nested_object_is_serialized() {
        let set = result_set(json!({"columns": ["x"], "data": [{"x": {"nested": 1}}]}));
        let ResultView::Table(table) = render_result(Some(&set)) else {
            panic!("expected a table");
        };
        assert_eq!(table.rows, vec![vec![r#"{"nested":1}"#.to_string()]]);
    }

    #[test]
    fn test_cells_follow_declared_columns() {
        let set = result_set(json!({
            "columns": ["state", "inflation", "rank"],
            "data": [
                {"state": "Kerala", "inflation": 5.5, "extra": "ignored"},
                {"state": null, "inflation": 0, "rank": [1, 2]}
            ]
        }));
        let ResultView::Table(table) = render_result(Some(&set)) else {
            panic!("expected a table");
        };
        assert_eq!(table.columns, vec!["state", "inflation", "rank"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["Kerala".to_string(), "5.5".to_string(), "N/A".to_string()],
                vec!["N/A".to_string(), "0".to_string(), "[1,2]".to_string()],
            ]
        );
    }

    #[test]
    fn test_scalars_render_as_text() {
        assert_eq!(format_cell(Some(&json!(true))), "true");
        assert_eq!(format_cell(Some(&json!(""))), "");
        assert_eq!(format_cell(Some(&json!(42))), "42");
    }

    #[test]
    fn test_table_text_is_aligned() {
        let table = Table {
            columns: vec!["name".to_string(), "n".to_string()],
            rows: vec![
                vec!["a".to_string(), "100".to_string()],
                vec!["ünïcode".to_string(), "7".to_string()],
            ],
        };
        assert_eq!(
            table.to_text(),
            "name    | n\n--------+----\na       | 100\nünïcode | 7"
        );
    }

    #[test]
    fn test_reasoning_disclosure() {
        let mut answer = Answer::new(None, None, None, Vec::new());
        assert_eq!(reasoning_disclosure(&answer), None);

        answer.reasoning = vec![
            "[Simple Query Generated] SELECT 1".to_string(),
            "[Executed Query] Returned 1 rows.".to_string(),
        ];
        assert_eq!(
            reasoning_disclosure(&answer),
            Some(ReasoningDisclosure {
                label: SHOW_REASONING,
                body: None
            })
        );

        answer.details_visible = true;
        let shown = reasoning_disclosure(&answer).unwrap();
        assert_eq!(shown.label, HIDE_REASONING);
        let body = shown.body.unwrap();
        assert!(body.contains("[Simple Query Generated] SELECT 1"));
        assert!(body.contains("[Executed Query] Returned 1 rows."));
    }

    #[test]
    fn test_reasoning_keeps_tag_like_text() {
        let mut answer = Answer::new(
            None,
            None,
            None,
            vec![
                "[Simple Query Generated] SELECT * FROM t WHERE a<b AND c>d".to_string(),
                "<b>note</b> kept".to_string(),
            ],
        );
        answer.details_visible = true;
        let body = reasoning_disclosure(&answer).unwrap().body.unwrap();
        assert_eq!(
            body,
            "[Simple Query Generated] SELECT * FROM t WHERE a<b AND c>d\n<b>note</b> kept"
        );
    }

    #[test]
    fn test_markdown_to_text() {
        let text = markdown_to_text("# Summary\n\nThe **average** is `5`.\n\n- one\n- two\n\n1. first\n2. second");
        assert_eq!(
            text,
            "Summary\n\nThe average is 5.\n\n• one\n• two\n\n1. first\n2. second"
        );
    }
}
