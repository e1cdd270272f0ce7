//! Phone/email normalization for booking fields (spec.md §4.10). STT
//! transcripts spell digits and symbols out as words, so the raw strings a
//! caller utters ("my number is two oh two, four five six, one four one
//! four") need folding into the form a calendar provider and an SMS gateway
//! expect before validation.

/// Lowercases, strips filler phrases, maps spoken digit words to digits, and
/// keeps only the digit characters that remain. Idempotent: normalizing an
/// already-normalized string is a no-op (P9).
pub fn normalize_phone(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut digits = String::new();
    for word in lowered.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        if let Some(d) = digit_word(word) {
            digits.push(d);
            continue;
        }
        for c in word.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
            }
        }
    }
    digits
}

fn digit_word(word: &str) -> Option<char> {
    Some(match word {
        "zero" | "oh" | "o" => '0',
        "one" => '1',
        "two" | "to" | "too" => '2',
        "three" => '3',
        "four" | "for" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" | "ate" => '8',
        "nine" => '9',
        _ => return None,
    })
}

/// True if `normalize_phone` produced at least 10 digits (a US/Canada NSN).
pub fn is_valid_phone(normalized: &str) -> bool {
    normalized.chars().filter(|c| c.is_ascii_digit()).count() >= 10
}

/// Folds spoken "at"/"dot" separators into `@`/`.`, lowercases, and strips
/// whitespace around the result. Idempotent (P9): re-running on an
/// already-normalized address like `d@example.com` is a no-op because
/// neither "at" nor "dot" appears as a standalone word once folded.
pub fn normalize_email(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut out = String::new();
    let mut first = true;
    for word in lowered.split_whitespace() {
        if !first {
            out.push(' ');
        }
        first = false;
        match word {
            "at" => out.push('@'),
            "dot" => out.push('.'),
            w => out.push_str(w),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join("").replace(" ", "")
}

/// True if `normalized` matches `^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$`.
pub fn is_valid_email(normalized: &str) -> bool {
    let Some((local, domain)) = normalized.split_once('@') else {
        return false;
    };
    if local.is_empty() || !local.chars().all(is_local_char) {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if host.is_empty() || !host.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
        return false;
    }
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalizes_spoken_phone_digits() {
        let n = normalize_phone("two oh two, four five six, one four one four");
        assert_eq!(n, "2024561414");
        assert!(is_valid_phone(&n));
    }

    #[test]
    fn normalizes_mixed_digit_and_word_phone() {
        let n = normalize_phone("202-456-1414");
        assert_eq!(n, "2024561414");
    }

    #[test]
    fn rejects_short_phone() {
        let n = normalize_phone("one two three");
        assert!(!is_valid_phone(&n));
    }

    #[test]
    fn normalizes_spoken_email() {
        let n = normalize_email("dick at example dot com");
        assert_eq!(n, "dick@example.com");
        assert!(is_valid_email(&n));
    }

    #[test]
    fn rejects_email_without_tld() {
        assert!(!is_valid_email("dick@example"));
    }

    #[test]
    fn phone_normalization_is_idempotent() {
        let once = normalize_phone("202-456-1414");
        let twice = normalize_phone(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn email_normalization_is_idempotent() {
        let once = normalize_email("dick at example dot com");
        let twice = normalize_email(&once);
        assert_eq!(once, twice);
    }

    proptest! {
        /// P9: normalize(normalize(x)) == normalize(x) for arbitrary input.
        #[test]
        fn prop_phone_normalization_idempotent(raw in "[a-zA-Z0-9 ,.\\-]{0,40}") {
            let once = normalize_phone(&raw);
            let twice = normalize_phone(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_email_normalization_idempotent(raw in "[a-zA-Z0-9 @.\\-_]{0,40}") {
            let once = normalize_email(&raw);
            let twice = normalize_email(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
