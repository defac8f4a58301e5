//! Field tokenizer
//!
//! Field classification and splitting are single left-to-right scans. No
//! pattern can make them revisit input, so hostile first lines cost the
//! same as ordinary ones.

use ml_prep_core::Delimiter;

/// Lexical class of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Nothing but whitespace
    Empty,
    /// Optional sign followed by digits
    Integer,
    /// Decimal or scientific literal
    Float,
    /// Anything else
    Text,
}

#[derive(Clone, Copy)]
enum State {
    Start,
    Sign,
    Digits,
    Point,
    LeadingPoint,
    Fraction,
    Exponent,
    ExponentSign,
    ExponentDigits,
}

/// Classify a field against `[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?`
pub fn classify(field: &str) -> FieldKind {
    let field = field.trim();
    if field.is_empty() {
        return FieldKind::Empty;
    }
    let mut state = State::Start;
    for byte in field.bytes() {
        state = match (state, byte) {
            (State::Start, b'+' | b'-') => State::Sign,
            (State::Start | State::Sign | State::Digits, b'0'..=b'9') => State::Digits,
            (State::Start | State::Sign, b'.') => State::LeadingPoint,
            (State::Digits, b'.') => State::Point,
            (State::Point | State::LeadingPoint | State::Fraction, b'0'..=b'9') => State::Fraction,
            (State::Digits | State::Point | State::Fraction, b'e' | b'E') => State::Exponent,
            (State::Exponent, b'+' | b'-') => State::ExponentSign,
            (State::Exponent | State::ExponentSign | State::ExponentDigits, b'0'..=b'9') => {
                State::ExponentDigits
            }
            _ => return FieldKind::Text,
        };
    }
    match state {
        State::Digits => FieldKind::Integer,
        State::Point | State::Fraction | State::ExponentDigits => FieldKind::Float,
        _ => FieldKind::Text,
    }
}

/// Parse an integer field; integers too large for `i64` are rejected
pub fn parse_integer(field: &str) -> Option<i64> {
    match classify(field) {
        FieldKind::Integer => field.trim().parse().ok(),
        _ => None,
    }
}

/// Parse an integer or float literal; literals that overflow `f64` are rejected
pub fn parse_number(field: &str) -> Option<f64> {
    match classify(field) {
        FieldKind::Integer | FieldKind::Float => {
            field.trim().parse().ok().filter(|value: &f64| value.is_finite())
        }
        _ => None,
    }
}

/// Split one line into trimmed fields
///
/// Double-quoted fields may contain the delimiter; `""` inside quotes is a
/// literal quote. Comma splitting keeps empty fields, whitespace splitting
/// collapses runs of blanks.
pub fn split_fields(line: &str, delimiter: Delimiter) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }
        match (c, delimiter) {
            ('"', _) => {
                in_quotes = true;
                quoted = true;
            }
            (',', Delimiter::Comma) => {
                fields.push(current.trim().to_string());
                current.clear();
                quoted = false;
            }
            (c, Delimiter::Whitespace) if c.is_whitespace() => {
                if !current.is_empty() || quoted {
                    fields.push(std::mem::take(&mut current));
                    quoted = false;
                }
            }
            (c, _) => current.push(c),
        }
    }

    match delimiter {
        Delimiter::Comma => fields.push(current.trim().to_string()),
        Delimiter::Whitespace => {
            if !current.is_empty() || quoted {
                fields.push(current);
            }
        }
    }
    fields
}
