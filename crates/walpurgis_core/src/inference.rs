//! Reading day numbers out of free text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"[0-9]+").expect("valid regex");
    static ref EXPLICIT_DAY: Regex =
        Regex::new(r"(?i)(?:day\s*#?|#|daily\s+johan\s+|johan\s+)([0-9]+)").expect("valid regex");
    static ref BARE_NUMBER: Regex = Regex::new(r"^[0-9]+$").expect("valid regex");
    static ref AFFIRMATIVE: Regex =
        Regex::new(r"(?i)\b(yes|yep|affirmative|sure|of course)\b").expect("valid regex");
    static ref MESSAGE_LINK: Regex =
        Regex::new(r"/channels/(?:[0-9]+|@me)/([0-9]+)/([0-9]+)").expect("valid regex");
    static ref DAY_LIST_SEPARATOR: Regex = Regex::new(r"[,\s]+").expect("valid regex");
}

/// How a post's text maps onto archive days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inference {
    /// No day marker could be read: the text has no digits, or a lone number
    /// with nothing marking it as the day.
    NoNumber,
    /// One explicitly marked day, e.g. `Day 12`, `#12`, `johan 12` or a bare `12`.
    SingleExplicit(i64),
    /// Several numbers and several attachments, paired positionally.
    Series(Vec<(i64, String)>),
    /// Several numbers but too few attachments to pair them with.
    MultipleAmbiguous { numbers: Vec<i64> },
}

/// Every maximal run of ASCII digits, in order of appearance.
///
/// Runs too large for a day number are dropped.
pub fn extract_numbers(text: &str) -> Vec<i64> {
    NUMBER.find_iter(text).filter_map(|m| parse_day(m.as_str())).collect()
}

/// Highest day number the bot will read from text.
pub const MAX_DAY: i64 = u32::MAX as i64;

fn parse_day(digits: &str) -> Option<i64> {
    digits.parse().ok().filter(|day| *day <= MAX_DAY)
}

/// The explicitly marked day in `text`, if there is one.
pub fn explicit_day(text: &str) -> Option<i64> {
    if let Some(caps) = EXPLICIT_DAY.captures(text) {
        return caps.get(1).and_then(|m| parse_day(m.as_str()));
    }
    let trimmed = text.trim();
    if BARE_NUMBER.is_match(trimmed) {
        return parse_day(trimmed);
    }
    None
}

/// Classify a post from its text and its (already capped) media.
///
/// Pairing wins over the explicit pattern once there are two numbers and two
/// attachments; with fewer attachments, two numbers are ambiguous even when one
/// of them is marked.
pub fn classify(text: &str, media: &[String]) -> Inference {
    let numbers = extract_numbers(text);

    if numbers.len() >= 2 {
        if media.len() >= 2 {
            return Inference::Series(pair_days(&numbers, media));
        }
        return Inference::MultipleAmbiguous { numbers };
    }

    match explicit_day(text) {
        Some(day) => Inference::SingleExplicit(day),
        None => Inference::NoNumber,
    }
}

/// Pair days with media by position, truncating to the shorter list.
pub fn pair_days(days: &[i64], media: &[String]) -> Vec<(i64, String)> {
    days.iter().copied().zip(media.iter().cloned()).collect()
}

/// Parse a manual day list like `"3, 4 5"`. Tokens that are not numbers are ignored.
pub fn parse_day_list(input: &str) -> Vec<i64> {
    DAY_LIST_SEPARATOR
        .split(input.trim())
        .filter(|token| BARE_NUMBER.is_match(token))
        .filter_map(parse_day)
        .collect()
}

/// `yes` or `y`, case-insensitive, ignoring surrounding whitespace.
pub fn is_yes(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "yes" | "y")
}

/// `no` or `n`, case-insensitive, ignoring surrounding whitespace.
pub fn is_no(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "no" | "n")
}

/// Looser agreement used when asking whether a post is a daily post at all.
pub fn is_affirmative(text: &str) -> bool {
    AFFIRMATIVE.is_match(text)
}

/// Extract `(channel_id, message_id)` from a message link.
pub fn parse_message_link(link: &str) -> Option<(u64, u64)> {
    let caps = MESSAGE_LINK.captures(link)?;
    let channel_id = caps.get(1)?.as_str().parse().ok()?;
    let message_id = caps.get(2)?.as_str().parse().ok()?;
    Some((channel_id, message_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn media(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("https://cdn/{}.png", i)).collect()
    }

    #[test]
    fn test_explicit_markers() {
        assert_eq!(classify("Day 12", &media(1)), Inference::SingleExplicit(12));
        assert_eq!(classify("day#7 lets go", &media(1)), Inference::SingleExplicit(7));
        assert_eq!(classify("#40", &media(1)), Inference::SingleExplicit(40));
        assert_eq!(classify("Daily Johan 3", &media(1)), Inference::SingleExplicit(3));
        assert_eq!(classify("johan 99", &media(1)), Inference::SingleExplicit(99));
        assert_eq!(classify("  15 ", &media(1)), Inference::SingleExplicit(15));
    }

    #[test]
    fn test_no_marker() {
        assert_eq!(classify("good morning", &media(1)), Inference::NoNumber);
        assert_eq!(classify("", &media(2)), Inference::NoNumber);
        assert_eq!(classify("took this at 5", &media(1)), Inference::NoNumber);
    }

    #[test]
    fn test_series_pairs_positionally() {
        let m = media(2);
        assert_eq!(
            classify("Day 12 and 13", &m),
            Inference::Series(vec![(12, m[0].clone()), (13, m[1].clone())])
        );
    }

    #[test]
    fn test_series_truncates_to_attachment_count() {
        let m = media(2);
        assert_eq!(
            classify("10 11 12", &m),
            Inference::Series(vec![(10, m[0].clone()), (11, m[1].clone())])
        );

        let m = media(3);
        assert_eq!(
            classify("20 21", &m),
            Inference::Series(vec![(20, m[0].clone()), (21, m[1].clone())])
        );
    }

    #[test]
    fn test_multiple_numbers_with_one_attachment_is_ambiguous() {
        assert_eq!(
            classify("Day 12 at 3pm", &media(1)),
            Inference::MultipleAmbiguous {
                numbers: vec![12, 3]
            }
        );
    }

    #[test]
    fn test_extract_numbers_ignores_non_ascii_digits() {
        assert_eq!(extract_numbers("a1b22c٣"), vec![1, 22]);
        assert_eq!(extract_numbers("99999999999999999999999 4"), vec![4]);
    }

    #[test]
    fn test_parse_day_list() {
        assert_eq!(parse_day_list("3, 4 5"), vec![3, 4, 5]);
        assert_eq!(parse_day_list("3,,x,7"), vec![3, 7]);
        assert!(parse_day_list("none").is_empty());
        assert_eq!(parse_day_list("9223372036854775807, 2"), vec![2]);
    }

    #[test]
    fn test_day_numbers_past_the_cap_are_ignored() {
        assert_eq!(explicit_day("Day 4294967295"), Some(MAX_DAY));
        assert_eq!(explicit_day("Day 4294967296"), None);
        assert_eq!(explicit_day("9223372036854775807"), None);
        assert_eq!(
            classify("Day 9223372036854775807", &["a".to_string()]),
            Inference::NoNumber
        );
    }

    #[test]
    fn test_reply_words() {
        assert!(is_yes(" Y "));
        assert!(is_yes("yes"));
        assert!(!is_yes("yeah"));
        assert!(is_no("No"));
        assert!(!is_no("nope"));
        assert!(is_affirmative("yep it is"));
        assert!(is_affirmative("Of course"));
        assert!(!is_affirmative("eyes"));
    }

    #[test]
    fn test_message_links() {
        assert_eq!(
            parse_message_link("https://discord.com/channels/1/22/333"),
            Some((22, 333))
        );
        assert_eq!(
            parse_message_link("https://discord.com/channels/@me/22/333"),
            Some((22, 333))
        );
        assert_eq!(parse_message_link("https://example.com/22/333"), None);
    }
}
