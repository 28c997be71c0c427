//! POSIX shell quoting for `run` command assembly.
//!
//! A `run` with several arguments joins them into one command line the
//! engine hands to `/bin/sh -c`. Arguments that could be re-split or
//! interpreted by the shell are wrapped in single quotes, with embedded
//! single quotes escaped as `'\''`.

/// Quotes one word for a POSIX shell.
pub fn quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    if word.bytes().all(is_safe) {
        return word.to_string();
    }
    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('\'');
    for c in word.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Joins words into a single shell-safe command line.
pub fn join<'a, I>(words: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    words.into_iter().map(quote).collect::<Vec<_>>().join(" ")
}

fn is_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'@' | b'%' | b'_' | b'+' | b'=' | b':' | b',' | b'.' | b'/' | b'-')
}
