use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::markup::cleanup_cell_text;

static TABLE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\{\|\s*class="wikitable"#).expect("table open pattern")
});

/// Generic table contents, before any domain interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn is_table_open(line: &str) -> bool {
    TABLE_OPEN_RE.is_match(line.trim())
}

/// Parses the wikitable whose open marker sits at `start_index`.
///
/// Returns the index of the line after the close marker (or `lines.len()` when
/// the table is never closed) together with the collected cells.
pub fn parse_wikitable<S: AsRef<str>>(lines: &[S], start_index: usize) -> (usize, RawTable) {
    let mut table = RawTable::default();
    let mut current_row: Vec<String> = Vec::new();
    let mut index = start_index + 1;

    while index < lines.len() {
        let stripped = lines[index].as_ref().trim();

        if stripped.starts_with("|}") {
            flush_row(&mut table, &mut current_row);
            return (index + 1, table);
        }

        if stripped.starts_with("|-") {
            flush_row(&mut table, &mut current_row);
        } else if stripped.starts_with("|+") {
            // caption
        } else if let Some(cell) = stripped.strip_prefix('!') {
            table.headers.push(cleanup_cell_text(cell.trim_start()));
        } else if let Some(cell) = stripped.strip_prefix('|') {
            current_row.push(cleanup_cell_text(cell.trim_start()));
        } else if !stripped.is_empty()
            && let Some(last) = current_row.last_mut()
        {
            let continuation = cleanup_cell_text(stripped);
            if last.is_empty() {
                *last = continuation;
            } else if !continuation.is_empty() {
                last.push(' ');
                last.push_str(&continuation);
            }
        }

        index += 1;
    }

    flush_row(&mut table, &mut current_row);
    (lines.len(), table)
}

fn flush_row(table: &mut RawTable, current_row: &mut Vec<String>) {
    if !current_row.is_empty() {
        table.rows.push(std::mem::take(current_row));
    }
}

#[cfg(test)]
mod tests {
    use super::{RawTable, is_table_open, parse_wikitable};

    fn lines(text: &str) -> Vec<&str> {
        text.split('\n').collect()
    }

    #[test]
    fn open_marker_accepts_extra_classes() {
        assert!(is_table_open("{| class=\"wikitable sortable\""));
        assert!(is_table_open("  {|class=\"WikiTable\""));
        assert!(!is_table_open("{| class=\"navbox\""));
    }

    #[test]
    fn parses_headers_rows_and_returns_line_after_close() {
        let source = lines(
            "{| class=\"wikitable\"\n! Index\n! Type\n|-\n| 0\n| Byte\n|-\n| 1\n| VarInt\n|}\ntrailing",
        );
        let (next, table) = parse_wikitable(&source, 0);
        assert_eq!(next, 10);
        assert_eq!(source[next], "trailing");
        assert_eq!(
            table,
            RawTable {
                headers: vec!["Index".to_string(), "Type".to_string()],
                rows: vec![
                    vec!["0".to_string(), "Byte".to_string()],
                    vec!["1".to_string(), "VarInt".to_string()],
                ],
            }
        );
    }

    #[test]
    fn continuation_line_joins_previous_cell_with_single_space() {
        let source = lines("{| class=\"wikitable\"\n|-\n| 0\n| Air ticks,\n  counted down\n|}");
        let (_, table) = parse_wikitable(&source, 0);
        assert_eq!(table.rows, vec![vec!["0", "Air ticks, counted down"]]);
    }

    #[test]
    fn unterminated_table_stops_at_end_of_input() {
        let source = lines("{| class=\"wikitable\"\n|-\n| a\n| b");
        let (next, table) = parse_wikitable(&source, 0);
        assert_eq!(next, source.len());
        assert_eq!(table.rows, vec![vec!["a", "b"]]);
    }

    #[test]
    fn captions_and_blank_lines_do_not_create_cells() {
        let source = lines("{| class=\"wikitable\"\n|+ Flags\n\n|-\n| 0x01\n| On fire\n|}");
        let (_, table) = parse_wikitable(&source, 0);
        assert_eq!(table.rows, vec![vec!["0x01", "On fire"]]);
    }
}
