use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const JUST_NOW: &str = "just now";

/// Phrase for the time elapsed between `timestamp` and `now`. Future
/// timestamps count as zero elapsed.
pub fn format_relative(timestamp: Option<OffsetDateTime>, now: OffsetDateTime) -> String {
    let Some(timestamp) = timestamp else {
        return JUST_NOW.to_string();
    };
    let seconds = (now - timestamp).whole_seconds().max(0);
    if seconds < 45 {
        return JUST_NOW.to_string();
    }
    if seconds < 90 {
        return "a minute ago".to_string();
    }

    let minutes = seconds / 60;
    if minutes < 45 {
        return plural(minutes, "minute");
    }
    if minutes < 90 {
        return "an hour ago".to_string();
    }

    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    if hours < 36 {
        return "a day ago".to_string();
    }

    let days = hours / 24;
    if days < 30 {
        return plural(days, "day");
    }

    let months = days / 30;
    if months < 18 {
        return plural(months, "month");
    }

    plural(months / 12, "year")
}

/// Public entry point for a timestamp still in its stored RFC 3339 string
/// form, such as a raw `updatedAt` value. Parsed notes go through
/// `format_relative` directly. Unparsable input reads as "just now".
pub fn format_relative_str(raw: Option<&str>, now: OffsetDateTime) -> String {
    let parsed = raw.and_then(|raw| OffsetDateTime::parse(raw.trim(), &Rfc3339).ok());
    format_relative(parsed, now)
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}
