use std::{collections::HashSet, fmt::Write as _};

use crate::document::MergeMap;

/// Lay out a flat, row-major cell list as an HTML table.
///
/// Cell `i` lands at `(i / column_size, i % column_size)`. A cell with a span
/// larger than one consumes the positions it covers; covered positions emit no
/// `<td>`. Spans are clipped to the grid. Cell content has its newlines removed so that every cell stays on
/// one line.
pub fn render_table<F>(column_size: usize, cells: &[String], merges: &MergeMap, mut render_cell: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut rows: Vec<Vec<String>> = Vec::new();
    if column_size > 0 {
        for (i, cell_id) in cells.iter().enumerate() {
            let (row, col) = (i / column_size, i % column_size);
            if rows.len() <= row {
                rows.resize_with(row + 1, Vec::new);
            }
            if rows[row].len() <= col {
                rows[row].resize_with(col + 1, String::new);
            }
            rows[row][col] = render_cell(cell_id).replace('\n', "");
        }
    }

    let mut covered = HashSet::new();
    let mut out = String::from("<table>\n");
    for (row, contents) in rows.iter().enumerate() {
        out.push_str("<tr>\n");
        for (col, content) in contents.iter().enumerate() {
            if covered.contains(&(row, col)) {
                continue;
            }
            let span = merges.get(row, col);
            let row_span = span.row_span.clamp(1, rows.len() - row);
            let col_span = span.col_span.clamp(1, column_size - col);
            if row_span == 1 && col_span == 1 {
                write!(out, "<td>{content}</td>").unwrap();
                continue;
            }
            out.push_str("<td");
            if row_span > 1 {
                write!(out, r#" rowspan="{row_span}""#).unwrap();
            }
            if col_span > 1 {
                write!(out, r#" colspan="{col_span}""#).unwrap();
            }
            write!(out, ">{content}</td>").unwrap();
            for r in row..row + row_span {
                for c in col..col + col_span {
                    covered.insert((r, c));
                }
            }
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::render_table;
    use crate::document::{MergeMap, Span};

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("c{i}")).collect()
    }

    #[test]
    fn plain_grid() {
        let html = render_table(2, &ids(4), &MergeMap::default(), |id| id.to_uppercase());
        assert_eq!(
            html,
            "<table>\n<tr>\n<td>C0</td><td>C1</td></tr>\n<tr>\n<td>C2</td><td>C3</td></tr>\n</table>\n"
        );
    }

    #[test]
    fn rowspan_covers_cell_below() {
        let mut merges = MergeMap::default();
        merges.insert(
            0,
            0,
            Span {
                row_span: 2,
                col_span: 1,
            },
        );
        let html = render_table(2, &ids(4), &merges, |id| id.to_string());
        assert_eq!(html.matches(r#"<td rowspan="2">"#).count(), 1);
        assert!(!html.contains("colspan"));
        assert!(!html.contains("c2"));
        assert_eq!(
            html,
            "<table>\n<tr>\n<td rowspan=\"2\">c0</td><td>c1</td></tr>\n<tr>\n<td>c3</td></tr>\n</table>\n"
        );
    }

    #[test]
    fn rectangular_span() {
        let mut merges = MergeMap::default();
        merges.insert(
            0,
            1,
            Span {
                row_span: 2,
                col_span: 2,
            },
        );
        let html = render_table(3, &ids(6), &merges, |id| id.to_string());
        assert!(html.contains(r#"<td rowspan="2" colspan="2">c1</td>"#));
        for hidden in ["c2", "c4", "c5"] {
            assert!(!html.contains(hidden), "{hidden} should be covered");
        }
        assert!(html.contains("<td>c3</td>"));
    }

    #[test]
    fn newlines_are_stripped_from_cells() {
        let html = render_table(1, &ids(1), &MergeMap::default(), |_| "a\nb\n".into());
        assert!(html.contains("<td>ab</td>"));
    }

    #[test]
    fn empty_cell_list_yields_shell() {
        assert_eq!(
            render_table(3, &[], &MergeMap::default(), |_| String::new()),
            "<table>\n</table>\n"
        );
        assert_eq!(
            render_table(0, &ids(2), &MergeMap::default(), |_| String::new()),
            "<table>\n</table>\n"
        );
    }

    #[test]
    fn partial_last_row() {
        let html = render_table(2, &ids(3), &MergeMap::default(), |id| id.to_string());
        assert!(html.ends_with("<tr>\n<td>c2</td></tr>\n</table>\n"));
    }

    #[test]
    fn oversized_spans_are_clipped_to_the_grid() {
        let mut merges = MergeMap::default();
        merges.insert(
            1,
            0,
            Span {
                row_span: usize::MAX,
                col_span: 1,
            },
        );
        merges.insert(
            0,
            1,
            Span {
                row_span: 1,
                col_span: 40,
            },
        );
        let html = render_table(2, &ids(4), &merges, |id| id.to_string());
        assert_eq!(
            html,
            "<table>\n<tr>\n<td>c0</td><td>c1</td></tr>\n<tr>\n<td>c2</td><td>c3</td></tr>\n</table>\n"
        );

        let mut merges = MergeMap::default();
        merges.insert(
            0,
            0,
            Span {
                row_span: 9,
                col_span: 0,
            },
        );
        let html = render_table(2, &ids(4), &merges, |id| id.to_string());
        assert!(html.contains(r#"<td rowspan="2">c0</td>"#));
        assert!(!html.contains("c2"));
    }
}
