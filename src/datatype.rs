//! Datatype support for `data` and `value` patterns.
//!
//! Covers the RELAX-NG builtin library (`string`, `token`) and a practical
//! subset of the XSD datatype library, with the facet parameters grammars
//! actually use (length bounds, `pattern`, numeric bounds). Whitespace
//! handling is per-type: `string` compares raw, everything else compares the
//! whitespace-collapsed value.

use std::fmt;

use regex::Regex;

pub const XSD_LIBRARY: &str = "http://www.w3.org/2001/XMLSchema-datatypes";

/// Identifier of a supported datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    // builtin library ""
    String,
    Token,
    // XSD subset
    XsdString,
    XsdNormalizedString,
    XsdToken,
    XsdBoolean,
    XsdInteger,
    XsdDecimal,
    XsdDouble,
    XsdLong,
    XsdInt,
    XsdNonNegativeInteger,
    XsdPositiveInteger,
    XsdAnyUri,
    XsdNcName,
    XsdNmtoken,
    XsdDate,
    XsdDateTime,
}

impl Datatype {
    /// Resolve a (datatypeLibrary, type-name) pair.
    pub fn lookup(library: &str, name: &str) -> Option<Datatype> {
        match library {
            "" => match name {
                "string" => Some(Datatype::String),
                "token" => Some(Datatype::Token),
                _ => None,
            },
            XSD_LIBRARY => match name {
                "string" => Some(Datatype::XsdString),
                "normalizedString" => Some(Datatype::XsdNormalizedString),
                "token" => Some(Datatype::XsdToken),
                "boolean" => Some(Datatype::XsdBoolean),
                "integer" => Some(Datatype::XsdInteger),
                "decimal" => Some(Datatype::XsdDecimal),
                "double" => Some(Datatype::XsdDouble),
                "long" => Some(Datatype::XsdLong),
                "int" => Some(Datatype::XsdInt),
                "nonNegativeInteger" => Some(Datatype::XsdNonNegativeInteger),
                "positiveInteger" => Some(Datatype::XsdPositiveInteger),
                "anyURI" => Some(Datatype::XsdAnyUri),
                "NCName" => Some(Datatype::XsdNcName),
                "NMTOKEN" => Some(Datatype::XsdNmtoken),
                "date" => Some(Datatype::XsdDate),
                "dateTime" => Some(Datatype::XsdDateTime),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether raw (uncollapsed) text is significant for this type.
    fn preserves_whitespace(self) -> bool {
        matches!(self, Datatype::String | Datatype::XsdString)
    }

    /// The value used for facet checks and equality comparisons.
    pub fn normalized(self, value: &str) -> String {
        if self.preserves_whitespace() {
            value.to_string()
        } else {
            collapse(value)
        }
    }

    /// Lexical check: does `value` belong to this type's value space?
    pub fn allows(self, value: &str) -> Result<(), String> {
        let v = self.normalized(value);
        match self {
            Datatype::String
            | Datatype::Token
            | Datatype::XsdString
            | Datatype::XsdNormalizedString
            | Datatype::XsdToken
            | Datatype::XsdAnyUri => Ok(()),
            Datatype::XsdBoolean => match v.as_str() {
                "true" | "false" | "1" | "0" => Ok(()),
                _ => Err(format!("\"{}\" is not a boolean", v)),
            },
            Datatype::XsdInteger => check_integer(&v).map(|_| ()),
            Datatype::XsdLong => {
                check_integer(&v)?
                    .ok_or_else(|| format!("\"{}\" is out of range for long", v))
                    .map(|_| ())
            }
            Datatype::XsdInt => {
                let n = check_integer(&v)?
                    .ok_or_else(|| format!("\"{}\" is out of range for int", v))?;
                if n >= i32::MIN as i64 && n <= i32::MAX as i64 {
                    Ok(())
                } else {
                    Err(format!("\"{}\" is out of range for int", v))
                }
            }
            Datatype::XsdNonNegativeInteger => {
                check_integer(&v)?;
                let digits = v.trim_start_matches(['+', '-']);
                if v.starts_with('-') && digits.bytes().any(|b| b != b'0') {
                    Err(format!("\"{}\" is not a non-negative integer", v))
                } else {
                    Ok(())
                }
            }
            Datatype::XsdPositiveInteger => {
                check_integer(&v)?;
                let negative = v.starts_with('-');
                let digits = v.trim_start_matches(['+', '-']);
                if !negative && digits.bytes().any(|b| b != b'0') {
                    Ok(())
                } else {
                    Err(format!("\"{}\" is not a positive integer", v))
                }
            }
            Datatype::XsdDecimal => check_decimal(&v),
            Datatype::XsdDouble => match v.as_str() {
                "INF" | "-INF" | "NaN" => Ok(()),
                _ => v
                    .parse::<f64>()
                    .map(|_| ())
                    .map_err(|_| format!("\"{}\" is not a double", v)),
            },
            Datatype::XsdNcName => check_ncname(&v),
            Datatype::XsdNmtoken => {
                if !v.is_empty() && v.chars().all(is_name_char) {
                    Ok(())
                } else {
                    Err(format!("\"{}\" is not an NMTOKEN", v))
                }
            }
            Datatype::XsdDate => check_date(&v),
            Datatype::XsdDateTime => check_date_time(&v),
        }
    }

    /// Value-space equality of two lexical representations.
    pub fn value_equal(self, a: &str, b: &str) -> bool {
        match self {
            Datatype::String | Datatype::XsdString => a == b,
            Datatype::XsdBoolean => boolean_value(a) == boolean_value(b),
            Datatype::XsdInteger
            | Datatype::XsdDecimal
            | Datatype::XsdDouble
            | Datatype::XsdLong
            | Datatype::XsdInt
            | Datatype::XsdNonNegativeInteger
            | Datatype::XsdPositiveInteger => {
                match (collapse(a).parse::<f64>(), collapse(b).parse::<f64>()) {
                    (Ok(x), Ok(y)) => x == y,
                    _ => collapse(a) == collapse(b),
                }
            }
            _ => collapse(a) == collapse(b),
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Datatype::String => "string",
            Datatype::Token => "token",
            Datatype::XsdString => "xsd:string",
            Datatype::XsdNormalizedString => "xsd:normalizedString",
            Datatype::XsdToken => "xsd:token",
            Datatype::XsdBoolean => "xsd:boolean",
            Datatype::XsdInteger => "xsd:integer",
            Datatype::XsdDecimal => "xsd:decimal",
            Datatype::XsdDouble => "xsd:double",
            Datatype::XsdLong => "xsd:long",
            Datatype::XsdInt => "xsd:int",
            Datatype::XsdNonNegativeInteger => "xsd:nonNegativeInteger",
            Datatype::XsdPositiveInteger => "xsd:positiveInteger",
            Datatype::XsdAnyUri => "xsd:anyURI",
            Datatype::XsdNcName => "xsd:NCName",
            Datatype::XsdNmtoken => "xsd:NMTOKEN",
            Datatype::XsdDate => "xsd:date",
            Datatype::XsdDateTime => "xsd:dateTime",
        };
        write!(f, "{}", name)
    }
}

fn boolean_value(s: &str) -> Option<bool> {
    match collapse(s).as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// XML whitespace collapse: trim, and squeeze internal runs to one space.
pub fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_xml_whitespace(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

fn check_integer(v: &str) -> Result<Option<i64>, String> {
    let digits = v.strip_prefix(['+', '-']).unwrap_or(v);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("\"{}\" is not an integer", v));
    }
    // Arbitrary-precision integers are lexically fine; range-limited types
    // get None back when the value does not fit in i64.
    Ok(v.parse::<i64>().ok())
}

fn check_decimal(v: &str) -> Result<(), String> {
    let body = v.strip_prefix(['+', '-']).unwrap_or(v);
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        Err(format!("\"{}\" is not a decimal", v))
    } else {
        Ok(())
    }
}

fn is_name_start_char(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || c == '-' || c == '.' || c.is_numeric()
}

fn check_ncname(v: &str) -> Result<(), String> {
    let mut chars = v.chars();
    match chars.next() {
        Some(c) if is_name_start_char(c) => {}
        _ => return Err(format!("\"{}\" is not an NCName", v)),
    }
    if chars.all(is_name_char) {
        Ok(())
    } else {
        Err(format!("\"{}\" is not an NCName", v))
    }
}

fn check_date(v: &str) -> Result<(), String> {
    let (date, _tz) = split_timezone(v);
    let parts: Vec<&str> = date.splitn(3, '-').collect();
    let ok = parts.len() == 3
        && parts[0].len() >= 4
        && parts[0].bytes().all(|b| b.is_ascii_digit())
        && parts[1].len() == 2
        && parts[2].len() == 2
        && matches!(parts[1].parse::<u32>(), Ok(1..=12))
        && matches!(parts[2].parse::<u32>(), Ok(1..=31));
    if ok {
        Ok(())
    } else {
        Err(format!("\"{}\" is not a date", v))
    }
}

fn check_date_time(v: &str) -> Result<(), String> {
    let (date, time) = match v.split_once('T') {
        Some(pair) => pair,
        None => return Err(format!("\"{}\" is not a dateTime", v)),
    };
    check_date(date).map_err(|_| format!("\"{}\" is not a dateTime", v))?;
    let (time, _tz) = split_timezone(time);
    let parts: Vec<&str> = time.splitn(3, ':').collect();
    let ok = parts.len() == 3
        && matches!(parts[0].parse::<u32>(), Ok(0..=23))
        && matches!(parts[1].parse::<u32>(), Ok(0..=59))
        && parts[2]
            .split_once('.')
            .map_or(parts[2].parse::<u32>().is_ok_and(|s| s <= 59), |(s, f)| {
                s.parse::<u32>().is_ok_and(|s| s <= 59)
                    && !f.is_empty()
                    && f.bytes().all(|b| b.is_ascii_digit())
            });
    if ok {
        Ok(())
    } else {
        Err(format!("\"{}\" is not a dateTime", v))
    }
}

fn split_timezone(v: &str) -> (&str, &str) {
    if let Some(stripped) = v.strip_suffix('Z') {
        return (stripped, "Z");
    }
    // A +hh:mm / -hh:mm suffix; a leading minus on the year is not a zone.
    if v.len() > 6 && v.is_char_boundary(v.len() - 6) {
        let (head, tail) = v.split_at(v.len() - 6);
        if (tail.starts_with('+') || tail.starts_with('-')) && tail.as_bytes()[3] == b':' {
            return (head, tail);
        }
    }
    (v, "")
}

/// Facet parameters attached to a `data` pattern.
#[derive(Debug, Clone, Default)]
pub struct DatatypeParams {
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<CompiledFacetPattern>,
    pub min_inclusive: Option<f64>,
    pub max_inclusive: Option<f64>,
    pub min_exclusive: Option<f64>,
    pub max_exclusive: Option<f64>,
}

/// A `pattern` facet, kept with its source so grammars compare structurally.
#[derive(Debug, Clone)]
pub struct CompiledFacetPattern {
    source: String,
    regex: Regex,
}

impl CompiledFacetPattern {
    pub fn compile(source: &str) -> Result<Self, String> {
        // XSD regexes are implicitly anchored.
        let anchored = format!("^(?:{})$", source);
        let regex = Regex::new(&anchored).map_err(|e| format!("bad pattern facet: {}", e))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for CompiledFacetPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl PartialEq for DatatypeParams {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length
            && self.min_length == other.min_length
            && self.max_length == other.max_length
            && self.pattern == other.pattern
            && self.min_inclusive == other.min_inclusive
            && self.max_inclusive == other.max_inclusive
            && self.min_exclusive == other.min_exclusive
            && self.max_exclusive == other.max_exclusive
    }
}

impl DatatypeParams {
    pub fn is_empty(&self) -> bool {
        *self == DatatypeParams::default()
    }

    /// Apply one `<param>` element. Unknown facet names are rejected.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), String> {
        let as_usize =
            |v: &str| v.trim().parse::<usize>().map_err(|_| format!("bad facet value \"{}\"", v));
        let as_f64 =
            |v: &str| v.trim().parse::<f64>().map_err(|_| format!("bad facet value \"{}\"", v));
        match name {
            "length" => self.length = Some(as_usize(value)?),
            "minLength" => self.min_length = Some(as_usize(value)?),
            "maxLength" => self.max_length = Some(as_usize(value)?),
            "pattern" => self.pattern = Some(CompiledFacetPattern::compile(value)?),
            "minInclusive" => self.min_inclusive = Some(as_f64(value)?),
            "maxInclusive" => self.max_inclusive = Some(as_f64(value)?),
            "minExclusive" => self.min_exclusive = Some(as_f64(value)?),
            "maxExclusive" => self.max_exclusive = Some(as_f64(value)?),
            other => return Err(format!("unsupported facet \"{}\"", other)),
        }
        Ok(())
    }

    /// Check a value (already known to be lexically valid for `datatype`)
    /// against the facets.
    pub fn check(&self, datatype: Datatype, value: &str) -> Result<(), String> {
        let v = datatype.normalized(value);
        let len = v.chars().count();
        if let Some(expected) = self.length {
            if len != expected {
                return Err(format!("length {} does not equal {}", len, expected));
            }
        }
        if let Some(min) = self.min_length {
            if len < min {
                return Err(format!("length {} is less than minLength {}", len, min));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(format!("length {} exceeds maxLength {}", len, max));
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&v) {
                return Err(format!("\"{}\" does not match pattern \"{}\"", v, pattern.source()));
            }
        }
        if self.min_inclusive.is_some()
            || self.max_inclusive.is_some()
            || self.min_exclusive.is_some()
            || self.max_exclusive.is_some()
        {
            let n = v
                .parse::<f64>()
                .map_err(|_| format!("\"{}\" is not numeric", v))?;
            if self.min_inclusive.is_some_and(|m| n < m) {
                return Err(format!("{} is less than minInclusive {}", n, self.min_inclusive.unwrap()));
            }
            if self.max_inclusive.is_some_and(|m| n > m) {
                return Err(format!("{} exceeds maxInclusive {}", n, self.max_inclusive.unwrap()));
            }
            if self.min_exclusive.is_some_and(|m| n <= m) {
                return Err(format!("{} is not greater than minExclusive {}", n, self.min_exclusive.unwrap()));
            }
            if self.max_exclusive.is_some_and(|m| n >= m) {
                return Err(format!("{} is not less than maxExclusive {}", n, self.max_exclusive.unwrap()));
            }
        }
        Ok(())
    }
}
