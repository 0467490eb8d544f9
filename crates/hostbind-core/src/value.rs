//! Values stored in stack slots, table entries and upvalues.

use std::fmt;
use std::rc::Rc;

use crate::native_fn::NativeFn;
use crate::table::TableRef;
use crate::userdata::UserDataRef;

/// Kind tag of a value.
///
/// The discriminants follow the classic runtime tag numbering, with
/// `None` (-1) standing for "no value at this index".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    None = -1,
    Nil = 0,
    Boolean = 1,
    LightUserData = 2,
    Number = 3,
    String = 4,
    Table = 5,
    Function = 6,
    UserData = 7,
}

impl ValueKind {
    /// Name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::None => "no value",
            ValueKind::Nil => "nil",
            ValueKind::Boolean => "boolean",
            ValueKind::LightUserData | ValueKind::UserData => "userdata",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Table => "table",
            ValueKind::Function => "function",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bare host address carried as a value. It owns nothing and has no
/// metatable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightUserData(pub usize);

impl LightUserData {
    /// Wrap the address of a host object.
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        LightUserData(ptr as usize)
    }

    /// The null address.
    pub const fn null() -> Self {
        LightUserData(0)
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn addr(self) -> usize {
        self.0
    }
}

/// A runtime value.
///
/// Tables, userdata and functions are reference types: cloning a `Value`
/// clones the reference, never the referent.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    LightUserData(LightUserData),
    Number(f64),
    String(Rc<str>),
    Table(TableRef),
    Function(NativeFn),
    UserData(UserDataRef),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::LightUserData(_) => ValueKind::LightUserData,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Table(_) => ValueKind::Table,
            Value::Function(_) => ValueKind::Function,
            Value::UserData(_) => ValueKind::UserData,
        }
    }

    /// Get a human-readable name for this value's kind.
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Truthiness: everything except `nil` and `false` is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Numeric view, coercing numeric strings.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// String view, coercing numbers.
    pub fn to_str(&self) -> Option<Rc<str>> {
        match self {
            Value::String(s) => Some(Rc::clone(s)),
            Value::Number(n) => Some(format_number(*n).into()),
            _ => None,
        }
    }

    /// The metatable attached to this value, if its kind carries one.
    pub fn metatable(&self) -> Option<TableRef> {
        match self {
            Value::Table(t) => t.metatable(),
            Value::UserData(u) => u.metatable(),
            _ => None,
        }
    }

    /// Primitive equality: no metamethods, reference types by identity.
    pub fn raw_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::LightUserData(a), Value::LightUserData(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::UserData(a), Value::UserData(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equal(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::LightUserData(p) => write!(f, "LightUserData({:#x})", p.0),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Table(t) => write!(f, "Table({:#x})", t.addr()),
            Value::Function(func) => write!(f, "Function({})", func.name()),
            Value::UserData(u) => write!(f, "UserData({:#x})", u.addr()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::String(value)
    }
}

impl From<LightUserData> for Value {
    fn from(value: LightUserData) -> Self {
        Value::LightUserData(value)
    }
}

impl From<TableRef> for Value {
    fn from(value: TableRef) -> Self {
        Value::Table(value)
    }
}

impl From<UserDataRef> for Value {
    fn from(value: UserDataRef) -> Self {
        Value::UserData(value)
    }
}

impl From<NativeFn> for Value {
    fn from(value: NativeFn) -> Self {
        Value::Function(value)
    }
}

/// Format a number the way the runtime prints it: `%.14g`, so at most 14
/// significant digits, trailing zeros dropped, and exponent notation below
/// `1e-4` or from `1e14` on.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    // Rounding to 14 digits first decides the exponent, as `%g` does.
    let sci = format!("{:.13e}", n);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if !(-4..14).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exp.unsigned_abs()
        )
    } else {
        let precision = (13 - exp) as usize;
        trim_fraction(&format!("{:.*}", precision, n)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Parse a numeric string: decimal, exponent or `0x` hexadecimal, with
/// surrounding whitespace allowed.
pub fn parse_number(s: &str) -> Option<f64> {
    let text = s.trim();
    if text.is_empty() {
        return None;
    }
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if body.starts_with(['+', '-']) {
        return None;
    }
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        let value = u64::from_str_radix(hex, 16).ok()? as f64;
        return Some(if negative { -value } else { value });
    }
    // `f64::from_str` also accepts "inf", "nan" and "infinity"; the runtime does not.
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    let value: f64 = body.parse().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::Number(1.0).type_name(), "number");
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(Value::LightUserData(LightUserData(8)).type_name(), "userdata");
        assert_eq!(ValueKind::None.name(), "no value");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::from("").is_truthy());
    }

    #[test]
    fn number_coercion() {
        assert_eq!(Value::from("42").to_number(), Some(42.0));
        assert_eq!(Value::from("  1.5e2 ").to_number(), Some(150.0));
        assert_eq!(Value::from("0x10").to_number(), Some(16.0));
        assert_eq!(Value::from("-0x10").to_number(), Some(-16.0));
        assert_eq!(Value::from("inf").to_number(), None);
        assert_eq!(Value::from("nan").to_number(), None);
        assert_eq!(Value::from("12abc").to_number(), None);
        assert_eq!(Value::Boolean(true).to_number(), None);
    }

    #[test]
    fn number_coercion_takes_one_sign() {
        assert_eq!(parse_number("+5"), Some(5.0));
        assert_eq!(parse_number("-5"), Some(-5.0));
        assert_eq!(parse_number("1e-5"), Some(1e-5));
        assert_eq!(parse_number("--5"), None);
        assert_eq!(parse_number("+-5"), None);
        assert_eq!(parse_number("-+5"), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("--0x10"), None);
    }

    #[test]
    fn string_coercion() {
        assert_eq!(Value::Number(3.0).to_str().as_deref(), Some("3"));
        assert_eq!(Value::Number(2.5).to_str().as_deref(), Some("2.5"));
        assert_eq!(Value::Nil.to_str(), None);
    }

    #[test]
    fn numbers_print_with_fourteen_significant_digits() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-7.0), "-7");
        assert_eq!(format_number(1.0 / 3.0), "0.33333333333333");
        assert_eq!(format_number(2.0 / 3.0), "0.66666666666667");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(0.0001), "0.0001");
        assert_eq!(format_number(0.00001), "1e-05");
        assert_eq!(format_number(12345678901234.0), "12345678901234");
        assert_eq!(format_number(1e14), "1e+14");
        assert_eq!(format_number(1e15), "1e+15");
        assert_eq!(format_number(2f64.powi(53)), "9.007199254741e+15");
        assert_eq!(format_number(-1.5e100), "-1.5e+100");
        assert_eq!(format_number(f64::INFINITY), "inf");
    }

    #[test]
    fn raw_equality() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::from("a"), Value::from("a"));
        assert_ne!(Value::Number(1.0), Value::from("1"));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));

        let a = TableRef::new();
        let b = TableRef::new();
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(b.clone()), Value::from(TableRef::new()));
    }

    #[test]
    fn light_userdata_null() {
        assert!(LightUserData::null().is_null());
        let x = 5u32;
        assert!(!LightUserData::from_ptr(&x).is_null());
    }
}
