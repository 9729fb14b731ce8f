use chrono::{DateTime, Utc};

/// Relative label for the last save, or `None` if nothing was saved yet.
///
/// Under a minute reads as "just now"; under an hour in whole minutes;
/// anything older in whole hours.
pub fn format_last_saved(last_saved: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<String> {
    let saved = last_saved?;
    let secs = (now - saved).num_seconds().max(0);
    let label = if secs < 60 {
        "Saved just now".to_string()
    } else if secs < 3600 {
        format!("Saved {} min ago", secs / 60)
    } else {
        format!("Saved {}h ago", secs / 3600)
    };
    Some(label)
}
