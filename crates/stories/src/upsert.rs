//! Insert-or-replace a dated row in the aggregate note.

use storyroll_config::{ExistingRows, RenderMode, UpsertConfig};

use crate::date::NoteDate;

/// Render mode plus existing-row handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertPolicy {
    pub render: RenderMode,
    pub existing: ExistingRows,
}

impl UpsertPolicy {
    /// One row per date, replacing the earlier row.
    pub fn single_row() -> Self {
        Self {
            render: RenderMode::SingleRow,
            existing: ExistingRows::Replace,
        }
    }

    /// One row per story line, appended on every run.
    pub fn multi_row() -> Self {
        Self {
            render: RenderMode::MultiRow,
            existing: ExistingRows::Append,
        }
    }

    pub fn with_existing(self, existing: ExistingRows) -> Self {
        Self { existing, ..self }
    }

    pub fn from_config(config: &UpsertConfig) -> Self {
        Self {
            render: config.render_mode,
            existing: config.effective_existing_rows(),
        }
    }
}

impl Default for UpsertPolicy {
    fn default() -> Self {
        Self::single_row()
    }
}

/// Leading cells of every row for `date`: `| [date](date) |`.
pub fn row_marker(date: NoteDate) -> String {
    format!("| [{date}]({date}) |")
}

/// Return `document` with `story` recorded under `date`.
///
/// Single-row rendering joins the story's lines with spaces and appends one
/// row, after making sure a non-empty document ends with a newline.
/// Multi-row rendering appends `\n` + row for every story line, so an empty
/// document gains a leading blank line.
///
/// With [`ExistingRows::Replace`], single-row removes the first marker
/// occurrence through its trailing newline; multi-row removes every marker
/// occurrence together with the newline that precedes it.
pub fn upsert(document: &str, date: NoteDate, story: &str, policy: UpsertPolicy) -> String {
    let marker = row_marker(date);
    let mut out = document.to_string();

    if policy.existing == ExistingRows::Replace {
        match policy.render {
            RenderMode::SingleRow => {
                remove_row_and_trailing_newline(&mut out, &marker);
            }
            RenderMode::MultiRow => while remove_row_and_leading_newline(&mut out, &marker) {},
        }
    }

    match policy.render {
        RenderMode::SingleRow => {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format_row(&marker, &join_lines(story)));
        }
        RenderMode::MultiRow => {
            for line in story_lines(story) {
                out.push('\n');
                out.push_str(&format_row(&marker, line));
            }
        }
    }

    out
}

/// Number of rows [`upsert`] appends for `story` under `render`.
pub fn rendered_row_count(story: &str, render: RenderMode) -> usize {
    match render {
        RenderMode::SingleRow => 1,
        RenderMode::MultiRow => story_lines(story).count(),
    }
}

fn format_row(marker: &str, text: &str) -> String {
    format!("{marker} {text} |")
}

fn join_lines(story: &str) -> String {
    story.replace("\r\n", " ").replace('\n', " ")
}

fn story_lines(story: &str) -> impl Iterator<Item = &str> {
    story
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

fn remove_row_and_trailing_newline(doc: &mut String, marker: &str) -> bool {
    let Some(start) = doc.find(marker) else {
        return false;
    };
    let end = doc[start..]
        .find('\n')
        .map(|pos| start + pos + 1)
        .unwrap_or(doc.len());
    doc.replace_range(start..end, "");
    true
}

fn remove_row_and_leading_newline(doc: &mut String, marker: &str) -> bool {
    let Some(start) = doc.find(marker) else {
        return false;
    };
    if !doc[..start].ends_with('\n') {
        return remove_row_and_trailing_newline(doc, marker);
    }
    let end = doc[start..]
        .find('\n')
        .map(|pos| start + pos)
        .unwrap_or(doc.len());
    doc.replace_range(start - 1..end, "");
    true
}
