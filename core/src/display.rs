//! One-line renderings of entries for `cliplog print` and launcher menus.

use crate::entry::{Entry, Timestamp};

pub fn format_time_ago(timestamp: Timestamp, now: Timestamp) -> String {
    let ago_mins = (now.as_datetime() - timestamp.as_datetime())
        .num_minutes()
        .max(0);

    if ago_mins < 1 {
        "now".to_string()
    } else if ago_mins < 60 {
        format!("{}m", ago_mins)
    } else if ago_mins < 60 * 24 {
        format!("{}h", ago_mins / 60)
    } else {
        format!("{}d", ago_mins / (60 * 24))
    }
}

pub fn format_size(chars: usize) -> String {
    if chars < 1000 {
        format!("{}c", chars)
    } else if chars < 1_000_000 {
        format!("{}K", chars / 1000)
    } else {
        format!("{}M", chars / 1_000_000)
    }
}

/// Flattens whitespace and cuts to `max_chars`, marking the cut with `…`.
pub fn truncate_to_fit(text: &str, max_chars: usize) -> String {
    let text = text.replace(['\n', '\r', '\t'], " ");

    if text.chars().count() <= max_chars {
        text
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

pub fn format_entry(entry: &Entry, now: Timestamp, max_chars: usize) -> String {
    let size = entry.value.chars().count();
    let mut line = format!("{:>4} ", format_time_ago(entry.timestamp, now));
    if size > max_chars {
        line.push_str(&format!("[{}] ", format_size(size)));
    }
    line.push_str(&truncate_to_fit(&entry.value, max_chars));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ts;

    #[test]
    fn time_ago_buckets() {
        let now = ts(20, 12, 0);
        assert_eq!(format_time_ago(now, now), "now");
        assert_eq!(format_time_ago(ts(20, 11, 15), now), "45m");
        assert_eq!(format_time_ago(ts(20, 2, 0), now), "10h");
        assert_eq!(format_time_ago(ts(17, 12, 0), now), "3d");
        assert_eq!(format_time_ago(ts(21, 0, 0), now), "now");
    }

    #[test]
    fn truncation_counts_chars() {
        assert_eq!(truncate_to_fit("short", 10), "short");
        assert_eq!(truncate_to_fit("a\nb\tc", 10), "a b c");
        assert_eq!(truncate_to_fit("ééééé", 3), "éé…");
    }

    #[test]
    fn long_entries_show_their_size() {
        let now = ts(20, 12, 0);
        let entry = Entry::new("x".repeat(1500), ts(20, 11, 59));
        let line = format_entry(&entry, now, 10);
        assert!(line.starts_with("  1m [1K] "));
        assert!(line.ends_with("xxxxxxxxx…"));

        let short = Entry::new("hi", now);
        assert_eq!(format_entry(&short, now, 10), " now hi");
    }
}
