//! FITS header cards.
//!
//! A header is a sequence of 80-character ASCII cards terminated by `END`
//! and padded to a multiple of 2880 bytes.

use crate::{FitsError, FitsResult};

/// FITS logical record size.
pub const BLOCK_SIZE: usize = 2880;

/// Size of one header card.
pub const CARD_SIZE: usize = 80;

/// Typed value of a header card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl HeaderValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            HeaderValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

/// One header card. Commentary cards (COMMENT, HISTORY, blank) carry no value.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: Option<HeaderValue>,
    pub comment: Option<String>,
}

/// Parsed primary header.
#[derive(Debug, Clone, Default)]
pub struct FitsHeader {
    cards: Vec<Card>,
}

impl FitsHeader {
    /// Parse a header from the start of `data`.
    ///
    /// Returns the header and the number of bytes it occupies, including the
    /// padding up to the next block boundary.
    pub fn parse(data: &[u8]) -> FitsResult<(Self, usize)> {
        let mut cards = Vec::new();

        for (index, raw) in data.chunks(CARD_SIZE).enumerate() {
            if raw.len() < CARD_SIZE {
                break;
            }
            // Cards are ASCII; anything else is replaced so byte slicing stays valid.
            let text: String = raw
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect();
            let keyword = text[..8].trim_end().to_string();

            if keyword == "END" {
                let used = (index + 1) * CARD_SIZE;
                let padded = used.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
                return Ok((Self { cards }, padded));
            }

            cards.push(parse_card(keyword, &text));
        }

        Err(FitsError::UnterminatedHeader)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Value of the first card with `keyword`.
    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.cards
            .iter()
            .find(|c| c.keyword == keyword)
            .and_then(|c| c.value.as_ref())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    pub fn get_int(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    pub fn get_float(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    pub fn get_bool(&self, keyword: &str) -> Option<bool> {
        self.get(keyword).and_then(HeaderValue::as_bool)
    }

    /// All COMMENT card texts, in order.
    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.cards
            .iter()
            .filter(|c| c.keyword == "COMMENT")
            .filter_map(|c| c.comment.as_deref())
    }
}

fn parse_card(keyword: String, text: &str) -> Card {
    // Value indicator "= " in columns 9-10.
    if text.len() >= 10 && &text[8..10] == "= " {
        let (value, comment) = parse_value(&text[10..]);
        return Card {
            keyword,
            value,
            comment,
        };
    }

    let comment = text.get(8..).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Card {
        keyword,
        value: None,
        comment,
    }
}

fn parse_value(field: &str) -> (Option<HeaderValue>, Option<String>) {
    let field = field.trim_start();

    if let Some(rest) = field.strip_prefix('\'') {
        // Quoted string; '' is an escaped quote.
        let mut value = String::new();
        let mut chars = rest.char_indices().peekable();
        let mut end = rest.len();
        while let Some((i, ch)) = chars.next() {
            if ch == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    value.push('\'');
                    chars.next();
                } else {
                    end = i + 1;
                    break;
                }
            } else {
                value.push(ch);
            }
        }
        let comment = split_comment(&rest[end.min(rest.len())..]).1;
        return (Some(HeaderValue::Text(value.trim_end().to_string())), comment);
    }

    let (raw, comment) = split_comment(field);
    let raw = raw.trim();
    let value = match raw {
        "" => None,
        "T" => Some(HeaderValue::Logical(true)),
        "F" => Some(HeaderValue::Logical(false)),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                Some(HeaderValue::Integer(i))
            } else if let Ok(f) = raw.replace(['D', 'd'], "E").parse::<f64>() {
                Some(HeaderValue::Float(f))
            } else {
                Some(HeaderValue::Text(raw.to_string()))
            }
        }
    };
    (value, comment)
}

fn split_comment(s: &str) -> (&str, Option<String>) {
    match s.find('/') {
        Some(idx) => {
            let comment = s[idx + 1..].trim();
            (&s[..idx], (!comment.is_empty()).then(|| comment.to_string()))
        }
        None => (s, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(s: &str) -> String {
        format!("{:<80}", s)
    }

    fn header(cards: &[&str]) -> Vec<u8> {
        let mut out: String = cards.iter().map(|c| card(c)).collect();
        out.push_str(&card("END"));
        let mut bytes = out.into_bytes();
        bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, b' ');
        bytes
    }

    #[test]
    fn test_parse_basic_values() {
        let data = header(&[
            "SIMPLE  =                    T / conforms to FITS standard",
            "BITPIX  =                  -32",
            "NAXIS   =                    2",
            "CDELT1  =  -2.777777777778E-04",
            "CRVAL2  =        4.71952777778D1",
            "CTYPE1  = 'RA---TAN'           / projection",
            "OBJECT  = 'O''Brien'",
            "COMMENT SkyView cutout",
        ]);
        let (h, used) = FitsHeader::parse(&data).unwrap();
        assert_eq!(used, BLOCK_SIZE);
        assert_eq!(h.get_bool("SIMPLE"), Some(true));
        assert_eq!(h.get_int("BITPIX"), Some(-32));
        assert!((h.get_float("CDELT1").unwrap() + 2.777777777778e-4).abs() < 1e-15);
        assert!((h.get_float("CRVAL2").unwrap() - 47.1952777778).abs() < 1e-9);
        assert_eq!(h.get_str("CTYPE1"), Some("RA---TAN"));
        assert_eq!(h.get_str("OBJECT"), Some("O'Brien"));
        assert_eq!(h.comments().collect::<Vec<_>>(), vec!["SkyView cutout"]);
    }

    #[test]
    fn test_missing_end_is_error() {
        let data = card("SIMPLE  =                    T").into_bytes();
        assert!(matches!(
            FitsHeader::parse(&data),
            Err(FitsError::UnterminatedHeader)
        ));
    }

    #[test]
    fn test_multi_block_header_length() {
        let cards: Vec<String> = (0..40).map(|i| format!("KEY{:<5}= {:>20}", i, i)).collect();
        let refs: Vec<&str> = cards.iter().map(String::as_str).collect();
        let data = header(&refs);
        let (h, used) = FitsHeader::parse(&data).unwrap();
        assert_eq!(h.len(), 40);
        assert_eq!(used, 2 * BLOCK_SIZE);
        assert_eq!(h.get_int("KEY39"), Some(39));
    }
}
