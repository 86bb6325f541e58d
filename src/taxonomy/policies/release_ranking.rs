use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static EL_MAJOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"el(\d+)").expect("static regex"));
static TOKEN_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,-]").expect("static regex"));

/// One piece of a tokenized version or release string.
///
/// Numeric tokens compare as integers (`10 > 9`) and always rank above
/// alphabetic ones; alphabetic tokens compare lexically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Alpha(String),
    /// Digits with leading zeros stripped, so any length compares correctly
    Numeric(String),
}

impl Token {
    fn parse(raw: &str) -> Self {
        if raw.chars().all(|c| c.is_ascii_digit()) {
            let trimmed = raw.trim_start_matches('0');
            Token::Numeric(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
        } else {
            Token::Alpha(raw.to_string())
        }
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Token::Numeric(a), Token::Numeric(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Token::Numeric(_), Token::Alpha(_)) => Ordering::Greater,
            (Token::Alpha(_), Token::Numeric(_)) => Ordering::Less,
            (Token::Alpha(a), Token::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Composite ranking key, compared field by field; greater is newer.
///
/// `Option` orders `None` first and `Vec` orders a strict prefix first, so
/// the derived ordering already gives "no timestamp ranks lowest" and
/// "the longer token array wins".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankKey {
    pub el_major: u32,
    pub completion_time: Option<DateTime<Utc>>,
    pub version: Vec<Token>,
    pub release: Vec<Token>,
}

/// ReleaseRanking policy for picking the current build of a component
///
/// The distribution release (`elN`) is ranked above the upstream version
/// because a newer distribution can carry an older upstream version during
/// a rebase.
pub struct ReleaseRanking;

impl ReleaseRanking {
    pub fn key(
        version: &str,
        release: &str,
        completion_time: Option<DateTime<Utc>>,
    ) -> RankKey {
        RankKey {
            el_major: Self::el_major(release),
            completion_time,
            version: Self::tokenize(version),
            release: Self::tokenize(release),
        }
    }

    /// Major number of the `elN` marker in a release, 0 when absent
    pub fn el_major(release: &str) -> u32 {
        EL_MAJOR
            .captures(release)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    }

    pub fn tokenize(value: &str) -> Vec<Token> {
        TOKEN_SEPARATORS
            .split(value)
            .filter(|raw| !raw.is_empty())
            .map(Token::parse)
            .collect()
    }

    /// Orders candidates best-first: higher key wins, then lower purl
    pub fn compare(a: (&RankKey, &str), b: (&RankKey, &str)) -> Ordering {
        b.0.cmp(a.0).then_with(|| a.1.cmp(b.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_numeric_tokens_compare_as_integers() {
        let nine = ReleaseRanking::key("9", "1", None);
        let ten = ReleaseRanking::key("10", "1", None);
        assert!(ten > nine);
    }

    #[test]
    fn test_numeric_beats_alpha() {
        assert!(Token::parse("1") > Token::parse("beta"));
        assert!(Token::parse("rc") > Token::parse("beta"));
        assert_eq!(Token::parse("007"), Token::parse("7"));
    }

    #[test]
    fn test_longer_array_wins_on_prefix() {
        let short = ReleaseRanking::key("1.2", "", None);
        let long = ReleaseRanking::key("1.2.1", "", None);
        assert!(long > short);
    }

    #[test]
    fn test_el_major_ranks_above_version() {
        let older_version_newer_distro = ReleaseRanking::key("1.0", "1.el9", None);
        let newer_version_older_distro = ReleaseRanking::key("2.0", "1.el8", None);
        assert!(older_version_newer_distro > newer_version_older_distro);
        assert_eq!(ReleaseRanking::el_major("3.el8_6"), 8);
        assert_eq!(ReleaseRanking::el_major("1"), 0);
    }

    #[test]
    fn test_completion_time_ranks_above_version() {
        let earlier = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let old_build = ReleaseRanking::key("2.0", "1.el8", Some(earlier));
        let new_build = ReleaseRanking::key("1.0", "1.el8", Some(later));
        let untimed = ReleaseRanking::key("3.0", "1.el8", None);
        assert!(new_build > old_build);
        assert!(old_build > untimed);
    }

    #[test]
    fn test_ties_break_by_purl() {
        let key = ReleaseRanking::key("1.0", "1", None);
        assert_eq!(
            ReleaseRanking::compare((&key, "pkg:rpm/a"), (&key, "pkg:rpm/b")),
            Ordering::Less
        );
    }

    #[test]
    fn test_tokenize_skips_empty_pieces() {
        assert_eq!(
            ReleaseRanking::tokenize("1..2,rc-3"),
            vec![
                Token::parse("1"),
                Token::parse("2"),
                Token::parse("rc"),
                Token::parse("3")
            ]
        );
    }
}
