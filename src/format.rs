//! Parsing and formatting helpers shared by the CLI and the TUI.

use chrono::{Datelike, Duration, NaiveDate, TimeDelta};

use crate::hierarchy::{indent, Marker, TreeRow};
use crate::task::Task;

/// Parse a due date relative to `today`.
///
/// Supported forms:
/// - "today", "tomorrow", "yesterday"
/// - weekday names ("friday", "next monday", "this wed")
/// - "end of week" / "eow", "end of month" / "eom"
/// - "in 3d", "in 2w"
/// - "YYYY-MM-DD"
pub fn parse_due_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        "end of week" | "eow" => return Some(start_end_of_this_week(today).1),
        "end of month" | "eom" => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            return NaiveDate::from_ymd_opt(year, month, 1).map(|d| d - Duration::days(1));
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        if let Some(n) = rest.strip_suffix('d').and_then(|n| n.trim().parse::<i64>().ok()) {
            return TimeDelta::try_days(n).and_then(|d| today.checked_add_signed(d));
        }
        if let Some(n) = rest.strip_suffix('w').and_then(|n| n.trim().parse::<i64>().ok()) {
            return TimeDelta::try_weeks(n).and_then(|d| today.checked_add_signed(d));
        }
    }

    let (next_week, day) = match s.strip_prefix("next ") {
        Some(day) => (true, day),
        None => (false, s.strip_prefix("this ").unwrap_or(&s)),
    };
    if let Some(target) = weekday_index(day) {
        let current = today.weekday().num_days_from_monday() as i64;
        let ahead = (target + 7 - current) % 7;
        let ahead = if next_week { ahead + 7 } else { ahead };
        return today.checked_add_signed(Duration::days(ahead));
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

fn weekday_index(name: &str) -> Option<i64> {
    const DAYS: [&str; 7] = [
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
    ];
    DAYS.iter()
        .position(|d| *d == name || (name.len() == 3 && d.starts_with(name)))
        .map(|i| i as i64)
}

/// Monday and Sunday of the week containing `today`.
pub fn start_end_of_this_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (start, start + Duration::days(6))
}

/// Relative label for an optional due date, `-` when there is none.
pub fn format_due(due: Option<NaiveDate>, today: NaiveDate) -> String {
    due.map_or_else(|| "-".to_string(), |d| format_due_relative(d, today))
}

/// "today", "tomorrow", "in 3d", "2d late".
pub fn format_due_relative(due: NaiveDate, today: NaiveDate) -> String {
    match (due - today).num_days() {
        0 => "today".into(),
        1 => "tomorrow".into(),
        n if n > 1 => format!("in {n}d"),
        n => format!("{}d late", -n),
    }
}

/// Truncate to `width` characters, ending with an ellipsis when shortened.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// `" [a,b]"` or nothing.
pub fn label_suffix(labels: &[String]) -> String {
    if labels.is_empty() {
        String::new()
    } else {
        format!(" [{}]", labels.join(","))
    }
}

/// Tag shown next to rows that could not be placed under a parent.
pub fn marker_tag(marker: Marker) -> &'static str {
    match marker {
        Marker::Plain => "",
        Marker::Orphan => " (orphan)",
        Marker::Cycle => " (cycle)",
    }
}

/// Print tasks as a table.
pub fn print_table(tasks: &[&Task], today: NaiveDate) {
    println!(
        "{:<10} {:<12} {:<7} {:<10} {}",
        "ID", "Status", "Pri", "Due", "Title [labels]"
    );
    for t in tasks {
        println!(
            "{:<10} {:<12} {:<7} {:<10} {}{}",
            truncate(&t.id, 10),
            t.status,
            t.priority,
            format_due(t.due_date, today),
            t.title,
            label_suffix(&t.labels)
        );
    }
}

/// One line of the hierarchy tree: indentation, title, child count and marker.
pub fn tree_line(row: &TreeRow<'_>) -> String {
    let count = if row.child_count > 0 {
        format!(" ({} subtasks)", row.child_count)
    } else {
        String::new()
    };
    format!(
        "{}{} [{}] {}{}{}",
        indent(row.depth),
        row.task.id,
        row.task.status,
        row.task.title,
        count,
        marker_tag(row.marker)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_relative_dates() {
        // a Wednesday
        let today = date(2024, 5, 15);
        assert_eq!(parse_due_input("today", today), Some(today));
        assert_eq!(parse_due_input(" Tomorrow ", today), Some(date(2024, 5, 16)));
        assert_eq!(parse_due_input("in 3d", today), Some(date(2024, 5, 18)));
        assert_eq!(parse_due_input("in 2w", today), Some(date(2024, 5, 29)));
        assert_eq!(parse_due_input("eow", today), Some(date(2024, 5, 19)));
        assert_eq!(parse_due_input("end of month", today), Some(date(2024, 5, 31)));
        assert_eq!(parse_due_input("friday", today), Some(date(2024, 5, 17)));
        assert_eq!(parse_due_input("wed", today), Some(today));
        assert_eq!(parse_due_input("next monday", today), Some(date(2024, 5, 27)));
        assert_eq!(parse_due_input("2024-12-01", today), Some(date(2024, 12, 1)));
        assert_eq!(parse_due_input("someday", today), None);
    }

    #[test]
    fn out_of_range_offsets_are_rejected() {
        let today = date(2026, 10, 19);
        assert_eq!(parse_due_input("in 999999999d", today), None);
        assert_eq!(parse_due_input("in -999999999w", today), None);
        assert_eq!(parse_due_input(&format!("in {}d", i64::MAX), today), None);
        assert_eq!(parse_due_input("in -2d", today), Some(date(2026, 10, 17)));
    }

    #[test]
    fn end_of_month_in_december() {
        assert_eq!(
            parse_due_input("eom", date(2024, 12, 3)),
            Some(date(2024, 12, 31))
        );
    }

    #[test]
    fn relative_due_labels() {
        let today = date(2024, 5, 15);
        assert_eq!(format_due_relative(today, today), "today");
        assert_eq!(format_due_relative(date(2024, 5, 16), today), "tomorrow");
        assert_eq!(format_due_relative(date(2024, 5, 20), today), "in 5d");
        assert_eq!(format_due_relative(date(2024, 5, 13), today), "2d late");
        assert_eq!(format_due(None, today), "-");
        assert_eq!(format_due(Some(today), today), "today");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("héllo wörld", 6), "héllo…");
        assert_eq!(truncate("abc", 0), "…");
    }

    #[test]
    fn tree_line_indents_and_marks() {
        let task = Task::new("x1", "Child");
        let row = TreeRow {
            task: &task,
            depth: 2,
            child_count: 3,
            marker: Marker::Orphan,
        };
        assert_eq!(
            tree_line(&row),
            "    x1 [Incomplete] Child (3 subtasks) (orphan)"
        );
    }
}
