//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `kbsync ls`, explorer `ls` | `render_resources_table()` |
//! | `kbsync connections` | `render_connections_table()` |
//! | `kbsync kbs` | `render_knowledge_bases_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, Color, ColumnConstraint, Table, Width};

use kbsync_core::{Connection, IndexStatus, KnowledgeBase, ResourceView};

use super::color::terminal_width;
use super::format::{format_relative_time, truncate_str};
use super::style::{display_name, status_label, Style};

/// Columns other than NAME take roughly this much room.
const FIXED_COLUMNS_WIDTH: usize = 40;

fn table_with_header(headers: Vec<Cell>) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(headers);
    table
}

/// Render the reconciled listing.
///
/// `selected` is `Some` in selection mode (no active knowledge base) and adds
/// a SEL column.
///
/// ```text
/// STATUS     NAME               TYPE        ID
/// indexed    My Documents/      directory   mock-folder-1
/// indexing   document.pdf       file        mock-file-1
/// -          Images/            directory   mock-folder-2
/// ```
pub fn render_resources_table(
    style: &Style,
    rows: &[ResourceView],
    selected: Option<&dyn Fn(&ResourceView) -> bool>,
) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut headers = Vec::new();
    if selected.is_some() {
        headers.push(Cell::new("SEL"));
    }
    headers.extend([
        Cell::new("STATUS"),
        Cell::new("NAME"),
        Cell::new("TYPE"),
        Cell::new("ID"),
    ]);
    let mut table = table_with_header(headers);

    let mut constraints = Vec::new();
    if selected.is_some() {
        constraints.push(ColumnConstraint::LowerBoundary(Width::Fixed(3)));
    }
    constraints.extend([
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // STATUS
        ColumnConstraint::LowerBoundary(Width::Fixed(12)), // NAME
        ColumnConstraint::LowerBoundary(Width::Fixed(9)),  // TYPE
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // ID
    ]);
    table.set_constraints(constraints);

    let colored = style.colors_enabled();
    if colored {
        table.enforce_styling();
    }

    let name_width = terminal_width().saturating_sub(FIXED_COLUMNS_WIDTH).max(16);
    for view in rows {
        let resource = &view.resource;
        let mut row = Vec::new();
        if let Some(is_selected) = selected {
            row.push(Cell::new(if is_selected(view) { "[x]" } else { "[ ]" }));
        }

        let mut status = Cell::new(status_label(view.status));
        let mut name = Cell::new(truncate_str(&display_name(resource), name_width));
        if colored {
            status = status.fg(match view.status {
                IndexStatus::Indexed => Color::Green,
                IndexStatus::Indexing => Color::Yellow,
                IndexStatus::NotIndexed => Color::DarkGrey,
            });
            if resource.is_directory() {
                name = name.fg(Color::Cyan);
            }
        }
        row.extend([
            status,
            name,
            Cell::new(resource.kind.to_string()),
            Cell::new(resource.resource_id.as_str()),
        ]);
        table.add_row(row);
    }

    table.trim_fmt().to_string()
}

/// ```text
/// NAME           PROVIDER   UPDATED      ID
/// Google Drive   gdrive     2025-08-26   96891794-4313-42f1-9d98-237e526165b8
/// ```
pub fn render_connections_table(connections: &[Connection]) -> String {
    if connections.is_empty() {
        return String::new();
    }
    let mut table = table_with_header(vec![
        Cell::new("NAME"),
        Cell::new("PROVIDER"),
        Cell::new("UPDATED"),
        Cell::new("ID"),
    ]);
    for connection in connections {
        let updated = connection
            .updated_at
            .or(connection.created_at)
            .map(format_relative_time)
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(truncate_str(&connection.name, 30)),
            Cell::new(&connection.connection_provider),
            Cell::new(updated),
            Cell::new(&connection.connection_id),
        ]);
    }
    table.trim_fmt().to_string()
}

/// `active` marks the knowledge base the session would use.
pub fn render_knowledge_bases_table(knowledge_bases: &[KnowledgeBase], active: Option<&str>) -> String {
    if knowledge_bases.is_empty() {
        return String::new();
    }
    let mut table = table_with_header(vec![
        Cell::new(""),
        Cell::new("NAME"),
        Cell::new("SOURCES").set_alignment(CellAlignment::Right),
        Cell::new("CREATED"),
        Cell::new("ID"),
    ]);
    for kb in knowledge_bases {
        let marker = if active == Some(kb.knowledge_base_id.as_str()) { "*" } else { "" };
        let created = kb
            .created_at
            .map(format_relative_time)
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(truncate_str(kb.display_name(), 32)),
            Cell::new(kb.connection_source_ids.len()).set_alignment(CellAlignment::Right),
            Cell::new(created),
            Cell::new(&kb.knowledge_base_id),
        ]);
    }
    table.trim_fmt().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::ColorMode;
    use kbsync_core::{IndexStatus, Resource};

    fn view(resource: Resource, status: IndexStatus) -> ResourceView {
        ResourceView { resource, status }
    }

    #[test]
    fn test_empty_tables_render_nothing() {
        let style = Style::new(ColorMode::Never);
        assert_eq!(render_resources_table(&style, &[], None), "");
        assert_eq!(render_connections_table(&[]), "");
        assert_eq!(render_knowledge_bases_table(&[], None), "");
    }

    #[test]
    fn test_resources_table() {
        let style = Style::new(ColorMode::Never);
        let rows = vec![
            view(Resource::directory("mock-folder-1", "My Documents"), IndexStatus::Indexed),
            view(Resource::file("mock-file-1", "document.pdf"), IndexStatus::Indexing),
        ];
        let output = render_resources_table(&style, &rows, None);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("STATUS") && lines[0].contains("NAME"));
        assert!(!lines[0].contains("SEL"));
        assert!(lines[1].contains("indexed") && lines[1].contains("My Documents/"));
        assert!(lines[2].contains("indexing") && lines[2].contains("mock-file-1"));
    }

    #[test]
    fn test_resources_table_selection_column() {
        let style = Style::new(ColorMode::Never);
        let rows = vec![
            view(Resource::file("a", "a.txt"), IndexStatus::NotIndexed),
            view(Resource::file("b", "b.txt"), IndexStatus::NotIndexed),
        ];
        let is_selected = |v: &ResourceView| v.resource.resource_id.as_str() == "b";
        let output = render_resources_table(&style, &rows, Some(&is_selected));
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].contains("SEL"));
        assert!(lines[1].contains("[ ]"));
        assert!(lines[2].contains("[x]"));
    }

    #[test]
    fn test_knowledge_bases_table_marks_active() {
        let kb = |id: &str, name: &str| KnowledgeBase {
            knowledge_base_id: id.to_string(),
            name: Some(name.to_string()),
            description: None,
            connection_id: None,
            connection_source_ids: vec!["x".to_string()],
            created_at: None,
        };
        let output = render_knowledge_bases_table(&[kb("kb-1", "First"), kb("kb-2", "Second")], Some("kb-2"));
        let lines: Vec<&str> = output.lines().collect();
        assert!(!lines[1].trim_start().starts_with('*'));
        assert!(lines[2].trim_start().starts_with('*'));
        assert!(lines[2].contains("Second"));
    }
}
