//! Read dated rows back out of the aggregate note.

use serde::Serialize;

use crate::date::NoteDate;

/// One `| [date](date) | text |` line of the aggregate note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
    pub date: NoteDate,
    pub text: String,
    /// Zero-based line number within the document.
    pub line: usize,
}

/// Every well-formed dated row, in document order.  Other lines (headers,
/// separators, prose) are skipped.
pub fn parse_rows(document: &str) -> Vec<AggregateRow> {
    document
        .lines()
        .enumerate()
        .filter_map(|(line, raw)| {
            let (date, text) = parse_row(raw)?;
            Some(AggregateRow {
                date,
                text: text.to_string(),
                line,
            })
        })
        .collect()
}

/// Row texts recorded for `date`, in document order.
pub fn stories_for(document: &str, date: NoteDate) -> Vec<String> {
    parse_rows(document)
        .into_iter()
        .filter(|row| row.date == date)
        .map(|row| row.text)
        .collect()
}

fn parse_row(line: &str) -> Option<(NoteDate, &str)> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let rest = line.strip_prefix("| [")?;
    let (label, rest) = rest.split_once("](")?;
    let (target, rest) = rest.split_once(')')?;
    if label != target {
        return None;
    }
    let date = label.parse::<NoteDate>().ok()?;
    let cell = rest.strip_prefix(" |")?.strip_suffix(" |")?;
    Some((date, cell.strip_prefix(' ').unwrap_or(cell)))
}
