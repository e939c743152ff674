use super::*;
use num_bigint::BigInt as JsBigInt;
use num_traits::{ToPrimitive, Zero};

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(i64),
    Float(f64),
    BigInt(JsBigInt),
    String(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectValue>>),
}

/// Insertion-ordered property bag.
#[derive(Debug, Clone, Default)]
pub struct ObjectValue {
    entries: Vec<(String, Value)>,
    index_by_key: HashMap<String, usize>,
}

impl ObjectValue {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        let mut value = Self::default();
        for (key, entry_value) in entries {
            value.set_entry(key, entry_value);
        }
        value
    }

    pub fn set_entry(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(index) = self.index_by_key.get(&key).copied() {
            if let Some((_, existing)) = self.entries.get_mut(index) {
                *existing = value;
                return;
            }
        }
        let index = self.entries.len();
        self.entries.push((key.clone(), value));
        self.index_by_key.insert(key, index);
    }

    pub fn get_entry(&self, key: &str) -> Option<Value> {
        self.index_by_key
            .get(key)
            .and_then(|index| self.entries.get(*index))
            .map(|(_, value)| value.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index_by_key.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<(String, Value)>> for ObjectValue {
    fn from(entries: Vec<(String, Value)>) -> Self {
        Self::new(entries)
    }
}

impl Value {
    pub fn object(entries: Vec<(&str, Value)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect::<Vec<_>>();
        Self::Object(Rc::new(RefCell::new(ObjectValue::new(entries))))
    }

    pub fn empty_object() -> Self {
        Self::Object(Rc::new(RefCell::new(ObjectValue::default())))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(values)))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(v) => *v,
            Self::String(v) => !v.is_empty(),
            Self::Number(v) => *v != 0,
            Self::Float(v) => *v != 0.0 && !v.is_nan(),
            Self::BigInt(v) => !v.is_zero(),
            Self::Array(_) => true,
            Self::Object(_) => true,
            Self::Null => false,
            Self::Undefined => false,
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Self::String(v) => v.clone(),
            Self::Bool(v) => {
                if *v {
                    "true".into()
                } else {
                    "false".into()
                }
            }
            Self::Number(v) => v.to_string(),
            Self::Float(v) => format_float(*v),
            Self::BigInt(v) => v.to_string(),
            Self::Array(values) => {
                let values = values.borrow();
                let mut out = String::new();
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    if value.is_nullish() {
                        continue;
                    }
                    out.push_str(&value.as_string());
                }
                out
            }
            Self::Object(_) => "[object Object]".into(),
            Self::Null => "null".into(),
            Self::Undefined => "undefined".into(),
        }
    }

    /// Property lookup with the usual fallbacks for arrays and strings.
    pub fn property(&self, name: &str) -> Value {
        match self {
            Self::Object(entries) => entries.borrow().get_entry(name).unwrap_or(Value::Undefined),
            Self::Array(values) => {
                let values = values.borrow();
                if name == "length" {
                    return Value::Number(values.len() as i64);
                }
                name.parse::<usize>()
                    .ok()
                    .and_then(|index| values.get(index).cloned())
                    .unwrap_or(Value::Undefined)
            }
            Self::String(text) if name == "length" => {
                Value::Number(text.encode_utf16().count() as i64)
            }
            _ => Value::Undefined,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Number(v) => *v as f64,
            Self::Float(v) => *v,
            Self::BigInt(v) => v.to_f64().unwrap_or(f64::NAN),
            Self::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Null => 0.0,
            Self::Undefined => f64::NAN,
            Self::String(v) => parse_number_from_string(v),
            Self::Array(_) | Self::Object(_) => parse_number_from_string(&self.as_string()),
        }
    }

    pub fn strict_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Number(l), Value::Number(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l == r,
            (Value::Number(l), Value::Float(r)) => (*l as f64) == *r,
            (Value::Float(l), Value::Number(r)) => *l == (*r as f64),
            (Value::BigInt(l), Value::BigInt(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Array(l), Value::Array(r)) => Rc::ptr_eq(l, r),
            (Value::Object(l), Value::Object(r)) => Rc::ptr_eq(l, r),
            (Value::Null, Value::Null) => true,
            (Value::Undefined, Value::Undefined) => true,
            _ => false,
        }
    }

    pub fn loose_equal(&self, other: &Value) -> bool {
        if self.strict_equal(other) {
            return true;
        }

        match (self, other) {
            (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => true,
            (Value::BigInt(l), Value::String(r)) => {
                parse_bigint_from_string(r).is_some_and(|parsed| parsed == *l)
            }
            (Value::String(l), Value::BigInt(r)) => {
                parse_bigint_from_string(l).is_some_and(|parsed| parsed == *r)
            }
            (Value::BigInt(big), number @ (Value::Number(_) | Value::Float(_)))
            | (number @ (Value::Number(_) | Value::Float(_)), Value::BigInt(big)) => {
                bigint_equals_number(big, number)
            }
            (Value::Number(_) | Value::Float(_), Value::String(_))
            | (Value::String(_), Value::Number(_) | Value::Float(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _) => Value::Float(self.to_number()).loose_equal(other),
            (_, Value::Bool(_)) => self.loose_equal(&Value::Float(other.to_number())),
            _ if self.is_primitive() && other.is_compound() && !self.is_nullish() => {
                self.loose_equal(&Value::String(other.as_string()))
            }
            _ if self.is_compound() && other.is_primitive() && !other.is_nullish() => {
                Value::String(self.as_string()).loose_equal(other)
            }
            _ => false,
        }
    }

    fn is_primitive(&self) -> bool {
        !self.is_compound()
    }

    fn is_compound(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }
}

fn bigint_equals_number(big: &JsBigInt, number: &Value) -> bool {
    match number {
        Value::Number(n) => *big == JsBigInt::from(*n),
        Value::Float(f) => integral_bigint(*f).is_some_and(|converted| converted == *big),
        _ => false,
    }
}

fn integral_bigint(value: f64) -> Option<JsBigInt> {
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    if (i64::MIN as f64..=i64::MAX as f64).contains(&value) {
        return Some(JsBigInt::from(value as i64));
    }
    JsBigInt::parse_bytes(format!("{value:.0}").as_bytes(), 10)
}

/// String to BigInt the way `BigInt("...")` reads it: radix prefixes take no
/// sign, decimal digits may carry one.
fn parse_bigint_from_string(src: &str) -> Option<JsBigInt> {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return Some(JsBigInt::zero());
    }
    if let Some((radix, digits)) = split_radix_prefix(trimmed) {
        return parse_bigint_digits(digits, radix);
    }
    if let Some(digits) = trimmed.strip_prefix('-') {
        return parse_bigint_digits(digits, 10).map(|magnitude| -magnitude);
    }
    parse_bigint_digits(trimmed.strip_prefix('+').unwrap_or(trimmed), 10)
}

fn parse_bigint_digits(digits: &str, radix: u32) -> Option<JsBigInt> {
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_digit(radix)) {
        return None;
    }
    JsBigInt::parse_bytes(digits.as_bytes(), radix)
}

fn split_radix_prefix(src: &str) -> Option<(u32, &str)> {
    let (prefix, digits) = (src.get(..2)?, src.get(2..)?);
    let radix = match prefix {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    Some((radix, digits))
}

pub(crate) fn parse_number_from_string(src: &str) -> f64 {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if trimmed == "Infinity" || trimmed == "+Infinity" {
        return f64::INFINITY;
    }
    if trimmed == "-Infinity" {
        return f64::NEG_INFINITY;
    }

    let Some((radix, digits)) = split_radix_prefix(trimmed) else {
        // Rust accepts "inf"/"nan" spellings that are not numeric here.
        if trimmed.chars().any(|ch| ch.is_ascii_alphabetic() && ch != 'e' && ch != 'E') {
            return f64::NAN;
        }
        return trimmed.parse::<f64>().unwrap_or(f64::NAN);
    };

    parse_prefixed_radix(digits, radix)
}

fn parse_prefixed_radix(src: &str, radix: u32) -> f64 {
    if src.is_empty() {
        return f64::NAN;
    }
    let mut out = 0.0f64;
    for ch in src.chars() {
        let Some(digit) = ch.to_digit(radix) else {
            return f64::NAN;
        };
        out = out * (radix as f64) + (digit as f64);
    }
    out
}

pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == f64::INFINITY {
        return "Infinity".to_string();
    }
    if value == f64::NEG_INFINITY {
        return "-Infinity".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e21 {
        return format!("{value:.0}");
    }

    let raw = if value.abs() >= 1e21 || value.abs() < 1e-6 {
        format!("{value:e}")
    } else {
        format!("{value}")
    };
    let Some(exp_idx) = raw.find('e').or_else(|| raw.find('E')) else {
        return raw;
    };
    let mantissa = &raw[..exp_idx];
    let exponent = raw[exp_idx + 1..].parse::<i32>().unwrap_or(0);
    format!("{mantissa}e{exponent:+}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        i64::try_from(value)
            .map(Self::Number)
            .unwrap_or(Self::Float(value as f64))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<JsBigInt> for Value {
    fn from(value: JsBigInt) -> Self {
        Self::BigInt(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Undefined
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::array(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_script_rules() {
        for falsy in [
            Value::Undefined,
            Value::Null,
            Value::Bool(false),
            Value::Number(0),
            Value::Float(0.0),
            Value::Float(f64::NAN),
            Value::BigInt(JsBigInt::zero()),
            Value::String(String::new()),
        ] {
            assert!(!falsy.truthy(), "{falsy:?} should be falsy");
        }
        for truthy in [
            Value::Bool(true),
            Value::Number(-1),
            Value::String("0".into()),
            Value::array(Vec::new()),
            Value::empty_object(),
        ] {
            assert!(truthy.truthy(), "{truthy:?} should be truthy");
        }
    }

    #[test]
    fn strict_equality_does_not_coerce() {
        assert!(Value::from(5).strict_equal(&Value::from(5.0)));
        assert!(!Value::from(5).strict_equal(&Value::from("5")));
        assert!(!Value::Float(f64::NAN).strict_equal(&Value::Float(f64::NAN)));
        assert!(!Value::Null.strict_equal(&Value::Undefined));

        let obj = Value::empty_object();
        assert!(obj.strict_equal(&obj.clone()));
        assert!(!obj.strict_equal(&Value::empty_object()));
    }

    #[test]
    fn loose_equality_coerces_primitives() {
        assert!(Value::from(5).loose_equal(&Value::from("5")));
        assert!(Value::from("0x10").loose_equal(&Value::from(16)));
        assert!(Value::from("").loose_equal(&Value::from(0)));
        assert!(Value::Null.loose_equal(&Value::Undefined));
        assert!(!Value::Null.loose_equal(&Value::from(0)));
        assert!(Value::from(true).loose_equal(&Value::from(1)));
        assert!(Value::from(true).loose_equal(&Value::from("1")));
        assert!(!Value::from(true).loose_equal(&Value::from("true")));
        assert!(Value::from(JsBigInt::from(42)).loose_equal(&Value::from("42")));
        assert!(Value::from(JsBigInt::from(42)).loose_equal(&Value::from(42.0)));
        assert!(!Value::from(JsBigInt::from(42)).loose_equal(&Value::from(42.5)));
    }

    #[test]
    fn bigint_reads_strings_like_bigint_constructor() {
        let sixteen = Value::from(JsBigInt::from(16));
        assert!(sixteen.loose_equal(&Value::from("0x10")));
        assert!(Value::from("0o20").loose_equal(&sixteen));
        assert!(sixteen.loose_equal(&Value::from(" 0b10000 ")));
        assert!(sixteen.loose_equal(&Value::from("+16")));
        assert!(Value::from(JsBigInt::from(-16)).loose_equal(&Value::from("-16")));
        assert!(!Value::from(JsBigInt::from(-16)).loose_equal(&Value::from("-0x10")));
        assert!(!sixteen.loose_equal(&Value::from("1_6")));
        assert!(!sixteen.loose_equal(&Value::from("0x")));
        assert!(!sixteen.loose_equal(&Value::from("16n")));
        assert!(Value::from(JsBigInt::zero()).loose_equal(&Value::from("  ")));
        assert!(!Value::from("abc").loose_equal(&Value::from(f64::NAN)));
    }

    #[test]
    fn loose_equality_renders_compound_values() {
        let list = Value::from(vec![1, 2]);
        assert!(list.loose_equal(&Value::from("1,2")));
        assert!(Value::from(vec![7]).loose_equal(&Value::from(7)));
        assert!(Value::empty_object().loose_equal(&Value::from("[object Object]")));
        assert!(!Value::empty_object().loose_equal(&Value::Null));
    }

    #[test]
    fn number_parsing_rejects_non_numeric_words() {
        assert!(parse_number_from_string("inf").is_nan());
        assert!(parse_number_from_string("NaN").is_nan());
        assert_eq!(parse_number_from_string(" 1e3 "), 1000.0);
        assert_eq!(parse_number_from_string("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(parse_number_from_string("0b101"), 5.0);
    }

    #[test]
    fn property_lookup_covers_objects_arrays_and_strings() {
        let obj = Value::object(vec![("name", Value::from("ada")), ("age", Value::from(0))]);
        assert_eq!(obj.property("name").as_string(), "ada");
        assert!(matches!(obj.property("missing"), Value::Undefined));

        let list = Value::from(vec!["a", "b"]);
        assert_eq!(list.property("length").as_string(), "2");
        assert_eq!(list.property("1").as_string(), "b");
        assert_eq!(Value::from("héllo").property("length").as_string(), "5");
    }

    #[test]
    fn float_rendering_matches_script_output() {
        assert_eq!(Value::from(1.5).as_string(), "1.5");
        assert_eq!(Value::from(3.0).as_string(), "3");
        assert_eq!(Value::from(1e21).as_string(), "1e+21");
        assert_eq!(Value::from(1.5e-7).as_string(), "1.5e-7");
        assert_eq!(Value::from(f64::NAN).as_string(), "NaN");
    }
}
