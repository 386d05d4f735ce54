//! Repairs for the almost-JSON narrators write in `ARGUMENTS:` lines.
//!
//! Each pass is a plain `&str -> String` function and [`PASSES`] lists them
//! in the order [`sanitize`] applies them. Every pass except fence stripping
//! only rewrites text outside string literals, so `'a, }'` survives intact.

use lazy_static::lazy_static;
use regex_lite::Regex;

lazy_static! {
    static ref BARE_KEY_RE: Regex =
        Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").expect("valid bare key regex");
    static ref TRAILING_COMMA_RE: Regex =
        Regex::new(r",(\s*[}\]])").expect("valid trailing comma regex");
    static ref PLUS_SIGN_RE: Regex =
        Regex::new(r"([:\[,]\s*)\+(\d)").expect("valid plus sign regex");
    static ref UNDEFINED_RE: Regex = Regex::new(r"\bundefined\b").expect("valid undefined regex");
    static ref NAN_RE: Regex = Regex::new(r"\bNaN\b").expect("valid NaN regex");
}

/// A named repair pass.
pub type Pass = (&'static str, fn(&str) -> String);

/// Every repair, in application order.
pub const PASSES: [Pass; 6] = [
    ("strip_code_fences", strip_code_fences),
    ("quote_bare_keys", quote_bare_keys),
    ("single_to_double_quotes", single_to_double_quotes),
    ("drop_trailing_commas", drop_trailing_commas),
    ("strip_plus_signs", strip_plus_signs),
    ("nullify_undefined", nullify_undefined),
];

/// Run every pass over `raw`.
pub fn sanitize(raw: &str) -> String {
    PASSES
        .iter()
        .fold(raw.to_string(), |text, (_, pass)| pass(&text))
}

/// Remove a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(s: &str) -> String {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim().to_string()
}

/// `{notation: "1d20"}` → `{"notation": "1d20"}`
pub fn quote_bare_keys(s: &str) -> String {
    map_code(s, |code| BARE_KEY_RE.replace_all(code, "${1}\"${2}\":").into_owned())
}

/// `'1d20'` → `"1d20"`, escaping any double quotes inside.
pub fn single_to_double_quotes(s: &str) -> String {
    segments(s)
        .into_iter()
        .map(|segment| match segment {
            Segment::Literal {
                quote: '\'',
                body,
                closed: true,
            } => requote(body),
            other => other.raw(),
        })
        .collect()
}

/// `[1, 2,]` → `[1, 2]`
pub fn drop_trailing_commas(s: &str) -> String {
    map_code(s, |code| TRAILING_COMMA_RE.replace_all(code, "${1}").into_owned())
}

/// `{"attackBonus": +5}` → `{"attackBonus": 5}`
pub fn strip_plus_signs(s: &str) -> String {
    map_code(s, |code| PLUS_SIGN_RE.replace_all(code, "${1}${2}").into_owned())
}

/// `undefined` and `NaN` → `null`
pub fn nullify_undefined(s: &str) -> String {
    map_code(s, |code| {
        let code = UNDEFINED_RE.replace_all(code, "null");
        NAN_RE.replace_all(&code, "null").into_owned()
    })
}

/// Text split into string literals and everything around them.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Code(&'a str),
    Literal {
        quote: char,
        body: &'a str,
        closed: bool,
    },
}

impl Segment<'_> {
    fn raw(&self) -> String {
        match self {
            Segment::Code(code) => code.to_string(),
            Segment::Literal { quote, body, closed } => {
                let mut out = String::with_capacity(body.len() + 2);
                out.push(*quote);
                out.push_str(body);
                if *closed {
                    out.push(*quote);
                }
                out
            }
        }
    }
}

fn segments(s: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut code_start = 0;
    let mut chars = s.char_indices();

    while let Some((start, c)) = chars.next() {
        if c != '"' && c != '\'' {
            continue;
        }
        if code_start < start {
            out.push(Segment::Code(&s[code_start..start]));
        }
        let body_start = start + 1;
        let mut escaped = false;
        let mut end = None;
        for (idx, inner) in chars.by_ref() {
            if escaped {
                escaped = false;
            } else if inner == '\\' {
                escaped = true;
            } else if inner == c {
                end = Some(idx);
                break;
            }
        }
        match end {
            Some(end) => {
                out.push(Segment::Literal {
                    quote: c,
                    body: &s[body_start..end],
                    closed: true,
                });
                code_start = end + 1;
            }
            None => {
                out.push(Segment::Literal {
                    quote: c,
                    body: &s[body_start..],
                    closed: false,
                });
                code_start = s.len();
            }
        }
    }
    if code_start < s.len() {
        out.push(Segment::Code(&s[code_start..]));
    }
    out
}

fn map_code(s: &str, f: impl Fn(&str) -> String) -> String {
    segments(s)
        .into_iter()
        .map(|segment| match segment {
            Segment::Code(code) => f(code),
            literal => literal.raw(),
        })
        .collect()
}

fn requote(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 2);
    out.push('"');
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push_str("\\\\"),
            },
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```JSON {\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_quote_bare_keys() {
        assert_eq!(
            quote_bare_keys("{notation: \"1d20\", context : \"x\"}"),
            "{\"notation\": \"1d20\", \"context\": \"x\"}"
        );
        assert_eq!(quote_bare_keys("{\"note\": \"{a: b}\"}"), "{\"note\": \"{a: b}\"}");
    }

    #[test]
    fn test_single_to_double_quotes() {
        assert_eq!(single_to_double_quotes("{'a': 'b'}"), "{\"a\": \"b\"}");
        assert_eq!(
            single_to_double_quotes(r#"{"say": 'he said "hi"'}"#),
            r#"{"say": "he said \"hi\""}"#
        );
        assert_eq!(single_to_double_quotes(r"{'it\'s': 1}"), r#"{"it's": 1}"#);
        assert_eq!(single_to_double_quotes(r#"{"a": "don't"}"#), r#"{"a": "don't"}"#);
    }

    #[test]
    fn test_drop_trailing_commas() {
        assert_eq!(drop_trailing_commas("{\"a\": [1, 2,], }"), "{\"a\": [1, 2] }");
        assert_eq!(drop_trailing_commas("{\"a\": \"x,}\"}"), "{\"a\": \"x,}\"}");
    }

    #[test]
    fn test_strip_plus_signs() {
        assert_eq!(strip_plus_signs("{\"bonus\": +5, \"list\": [+1, +2]}"), "{\"bonus\": 5, \"list\": [1, 2]}");
        assert_eq!(strip_plus_signs("{\"n\": \"1d8 +2\"}"), "{\"n\": \"1d8 +2\"}");
    }

    #[test]
    fn test_nullify_undefined() {
        assert_eq!(
            nullify_undefined("{\"a\": undefined, \"b\": NaN, \"c\": \"NaN\"}"),
            "{\"a\": null, \"b\": null, \"c\": \"NaN\"}"
        );
        assert_eq!(nullify_undefined("{\"undefinedness\": 1}"), "{\"undefinedness\": 1}");
    }

    #[test]
    fn test_full_pipeline() {
        let fixed = sanitize("```json\n{notation: '1d20', context: 'test', bonus: +2, tags: ['a',],}\n```");
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(
            value,
            json!({"notation": "1d20", "context": "test", "bonus": 2, "tags": ["a"]})
        );
    }

    #[test]
    fn test_literals_survive_every_pass() {
        let fixed = sanitize("{note: 'a, } +3 undefined: b'}");
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value, json!({"note": "a, } +3 undefined: b"}));
    }

    #[test]
    fn test_pass_order() {
        let names: Vec<&str> = PASSES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.first(), Some(&"strip_code_fences"));
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn test_unterminated_literal_is_left_alone() {
        assert_eq!(segments("{'a"), vec![Segment::Code("{"), Segment::Literal { quote: '\'', body: "a", closed: false }]);
        assert_eq!(single_to_double_quotes("{'a"), "{'a");
    }
}
