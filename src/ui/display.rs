//! Terminal output for run results

use crate::types::{ResolvedSession, RunSummary, TrendingVideo};
use colored::Colorize;

/// Group digits of a raw count: "1234567" -> "1,234,567"
pub fn format_count(raw: &str) -> String {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Just the date part of an RFC 3339 timestamp
fn short_date(published_at: &str) -> &str {
    published_at.split('T').next().unwrap_or(published_at)
}

pub fn print_trending(videos: &[TrendingVideo], region: &str) {
    if videos.is_empty() {
        println!("{}", format!("No trending videos for {}", region).yellow());
        return;
    }

    println!("{}", format!("Trending in {}", region).bold());
    for (i, video) in videos.iter().enumerate() {
        println!("{} {}", format!("{:>2}.", i + 1).dimmed(), video.title.bold());
        println!(
            "    {} {} {}",
            video.channel_title.cyan(),
            format!("[{}]", short_date(&video.published_at)).dimmed(),
            format!(
                "{} views, {} likes",
                format_count(&video.view_count),
                format_count(&video.like_count)
            )
            .dimmed()
        );
        println!("    {}", video.url.blue());
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    println!("{}", "Scrape finished".bold());
    println!("  targets     {}", summary.targets);
    println!("  discovered  {}", summary.discovered);
    println!("  written     {}", summary.written.to_string().green());
    println!("  skipped     {}", summary.skipped.to_string().dimmed());
    let failed = summary.failed.to_string();
    if summary.failed > 0 {
        println!("  failed      {}", failed.red());
    } else {
        println!("  failed      {}", failed);
    }
}

/// Describe the resolved session. Only names and counts, never cookie values.
pub fn session_report(session: &ResolvedSession) -> String {
    if !session.is_authenticated() {
        return "unauthenticated (no cookies)".to_string();
    }
    let auth = if session.cookies.has_auth_cookie() {
        "auth cookie present"
    } else {
        "no auth cookie"
    };
    format!(
        "{}, {} cookies, {}",
        session.source,
        session.cookies.len(),
        auth
    )
}

pub fn print_session_report(session: &ResolvedSession) {
    let line = session_report(session);
    if session.is_authenticated() {
        println!("{} {}", "Credentials:".bold(), line.green());
    } else {
        println!("{} {}", "Credentials:".bold(), line.yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cookies;
    use crate::types::CredentialSource;
    use std::path::PathBuf;

    #[test]
    fn groups_digits() {
        assert_eq!(format_count("7"), "7");
        assert_eq!(format_count("1000"), "1,000");
        assert_eq!(format_count("1234567"), "1,234,567");
        assert_eq!(format_count("N/A"), "N/A");
    }

    #[test]
    fn trims_timestamps_to_dates() {
        assert_eq!(short_date("2024-05-01T10:00:00Z"), "2024-05-01");
        assert_eq!(short_date(""), "");
    }

    #[test]
    fn report_never_contains_cookie_values() {
        let set = cookies::parse(
            ".youtube.com\tTRUE\t/\tTRUE\t1999999999\tSAPISID\tsecret-value\n",
        );
        let session = ResolvedSession::new(
            CredentialSource::CookieFile(PathBuf::from("/tmp/c.txt")),
            set,
        );
        let report = session_report(&session);
        assert!(report.contains("1 cookies"));
        assert!(report.contains("auth cookie present"));
        assert!(!report.contains("secret-value"));

        assert!(session_report(&ResolvedSession::unauthenticated()).starts_with("unauthenticated"));
    }
}
