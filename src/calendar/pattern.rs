//! Date pattern mini-language.
//!
//! Tokens are matched case-insensitively: `YYYY`, `YY`, `MM`, `DD`, `HH24`,
//! `MI`, `SS`. Everything else is a literal that must appear verbatim in the
//! input. A lone `M` or `H` is therefore a literal, not a field.

/// A calendar field addressed by a pattern token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Year,
    ShortYear,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl Field {
    /// Maximum number of digits consumed when parsing, and padding width
    /// when formatting.
    pub fn width(self) -> usize {
        match self {
            Field::Year => 4,
            _ => 2,
        }
    }
}

/// One element of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Field(Field),
    Literal(char),
}

// Longest tokens first so `YYYY` wins over `YY`.
const TOKENS: [(&str, Field); 7] = [
    ("YYYY", Field::Year),
    ("HH24", Field::Hour),
    ("YY", Field::ShortYear),
    ("MM", Field::Month),
    ("DD", Field::Day),
    ("MI", Field::Minute),
    ("SS", Field::Second),
];

/// Compile a pattern string into tokens.
pub fn compile(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    'outer: while i < chars.len() {
        for (text, field) in TOKENS {
            let len = text.len();
            if i + len <= chars.len()
                && chars[i..i + len]
                    .iter()
                    .zip(text.chars())
                    .all(|(c, t)| c.to_ascii_uppercase() == t)
            {
                tokens.push(Token::Field(field));
                i += len;
                continue 'outer;
            }
        }
        tokens.push(Token::Literal(chars[i]));
        i += 1;
    }

    tokens
}

/// Raw calendar fields as read from text, before calendar validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    pub year: Option<i32>,
    pub short_year: Option<u32>,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            year: None,
            short_year: None,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

/// Read fields from `text` according to compiled `tokens`.
///
/// Numeric fields are greedy up to their width and need at least one digit.
pub fn read_fields(text: &str, tokens: &[Token]) -> Result<Fields, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut fields = Fields::default();
    let mut pos = 0;

    for token in tokens {
        match token {
            Token::Literal(expected) => match chars.get(pos) {
                Some(c) if c == expected => pos += 1,
                Some(c) => {
                    return Err(format!(
                        "expected '{}' at position {}, found '{}'",
                        expected, pos, c
                    ))
                }
                None => return Err(format!("expected '{}' at end of input", expected)),
            },
            Token::Field(field) => {
                let start = pos;
                while pos < chars.len() && pos - start < field.width() && chars[pos].is_ascii_digit()
                {
                    pos += 1;
                }
                if pos == start {
                    return Err(format!("expected digits for {:?} at position {}", field, start));
                }
                let digits: String = chars[start..pos].iter().collect();
                let value: u32 = digits
                    .parse()
                    .map_err(|_| format!("invalid number '{}'", digits))?;
                match field {
                    Field::Year => fields.year = Some(value as i32),
                    Field::ShortYear => fields.short_year = Some(value),
                    Field::Month => fields.month = value,
                    Field::Day => fields.day = value,
                    Field::Hour => fields.hour = value,
                    Field::Minute => fields.minute = value,
                    Field::Second => fields.second = value,
                }
            }
        }
    }

    if pos < chars.len() {
        let rest: String = chars[pos..].iter().collect();
        return Err(format!("unexpected trailing input '{}'", rest));
    }

    Ok(fields)
}

/// Render fields according to compiled `tokens`, zero padded.
pub fn write_fields(fields: &Fields, tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Literal(c) => out.push(*c),
            Token::Field(field) => {
                let value: i64 = match field {
                    Field::Year => fields.year.unwrap_or(0) as i64,
                    Field::ShortYear => fields.year.unwrap_or(0).rem_euclid(100) as i64,
                    Field::Month => fields.month as i64,
                    Field::Day => fields.day as i64,
                    Field::Hour => fields.hour as i64,
                    Field::Minute => fields.minute as i64,
                    Field::Second => fields.second as i64,
                };
                out.push_str(&format!("{:0width$}", value, width = field.width()));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_is_case_insensitive() {
        assert_eq!(compile("yyyy-MM-dd"), compile("YYYY-mm-DD"));
        assert_eq!(
            compile("hh24:mi"),
            vec![
                Token::Field(Field::Hour),
                Token::Literal(':'),
                Token::Field(Field::Minute)
            ]
        );
    }

    #[test]
    fn unknown_letters_are_literals() {
        let tokens = compile("YYYY-M");
        assert_eq!(tokens.last(), Some(&Token::Literal('M')));
    }

    #[test]
    fn read_fixed_width_compact_dates() {
        let fields = read_fields("14040320", &compile("yyyymmdd")).unwrap();
        assert_eq!(fields.year, Some(1404));
        assert_eq!(fields.month, 3);
        assert_eq!(fields.day, 20);
    }

    #[test]
    fn read_unpadded_fields() {
        let fields = read_fields("1404/5/25 7:3:9", &compile("yyyy/mm/dd hh24:mi:ss")).unwrap();
        assert_eq!((fields.month, fields.day), (5, 25));
        assert_eq!((fields.hour, fields.minute, fields.second), (7, 3, 9));
    }

    #[test]
    fn read_reports_literal_mismatch_and_trailing_text() {
        assert!(read_fields("2024/01/01", &compile("yyyy-mm-dd")).is_err());
        assert!(read_fields("2024-01-01x", &compile("yyyy-mm-dd")).is_err());
        assert!(read_fields("2024-01-", &compile("yyyy-mm-dd")).is_err());
    }

    #[test]
    fn write_pads_fields() {
        let fields = Fields {
            year: Some(2024),
            month: 3,
            day: 7,
            hour: 5,
            ..Fields::default()
        };
        assert_eq!(
            write_fields(&fields, &compile("YYYY-MM-DD HH24:MI:SS")),
            "2024-03-07 05:00:00"
        );
        assert_eq!(write_fields(&fields, &compile("YY")), "24");
    }
}
