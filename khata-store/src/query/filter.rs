//! Filter Translator
//!
//! `TigerStyle`: Parse once at the call boundary, validate before I/O.
//!
//! A [`FilterSpec`] is an ordered list of typed [`Comparison`]s. Callers
//! either build one through the typed helpers (`eq`, `gte`, `contains`, ...)
//! or hand raw `field__operator` pairs to [`FilterSpec::parse`], which is the
//! single place the string mini-language is interpreted. Unknown operator
//! suffixes are rejected there, before any backend I/O.
//!
//! The same specification translates two ways:
//! - [`FilterSpec::to_document`] - native query document for the document
//!   backend (`$gte`, `$in`, anchored `$regex`, `$exists`).
//! - [`FilterSpec::matches`] - in-memory predicate for backends that can
//!   only scan (key-value) or for the in-memory driver.
//!
//! Comparison values that parse as RFC 3339 timestamps are canonicalized to
//! UTC microsecond precision when the operator is a value comparison, so the
//! fixed-width strings this layer stores compare identically on every
//! backend. Textual operators (`contains`, `startswith`, ...) leave their
//! values untouched.

use std::cmp::Ordering;

use serde_json::Value;

use crate::constants::{
    FILTER_COMPARISONS_COUNT_MAX, FILTER_OPERATOR_SEPARATOR, RECORD_FIELD_NAME_BYTES_MAX,
};
use crate::model::Record;
use crate::storage::{StoreError, StoreResult};

// =============================================================================
// Compare Operator
// =============================================================================

/// Comparison operators of the filter mini-language.
///
/// Suffix forms (after `__` in a filter key) are listed per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Exact match (no suffix)
    Eq,
    /// `ne` - not equal
    Ne,
    /// `gt` - greater than
    Gt,
    /// `gte` - greater than or equal
    Gte,
    /// `lt` - less than
    Lt,
    /// `lte` - less than or equal
    Lte,
    /// `in` - value is one of the given list
    In,
    /// `nin` - value is none of the given list
    Nin,
    /// `contains` - substring (or array element) match
    Contains,
    /// `icontains` - case-insensitive substring match
    IContains,
    /// `startswith` - anchored prefix match
    StartsWith,
    /// `endswith` - anchored suffix match
    EndsWith,
    /// `isnull` - field existence check
    IsNull,
}

impl CompareOp {
    /// Parse an operator suffix. Returns `None` for unknown suffixes.
    #[must_use]
    pub fn parse_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            "nin" => Some(Self::Nin),
            "contains" => Some(Self::Contains),
            "icontains" => Some(Self::IContains),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            "isnull" => Some(Self::IsNull),
            _ => None,
        }
    }

    /// Suffix form of this operator (empty for `Eq`).
    #[must_use]
    pub fn as_suffix(&self) -> &'static str {
        match self {
            Self::Eq => "",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Nin => "nin",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::IsNull => "isnull",
        }
    }

    /// Whether this operator compares field values (as opposed to testing
    /// text shape or existence). Value comparisons get their RFC 3339
    /// bounds canonicalized.
    #[must_use]
    fn compares_values(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Gte | Self::Lt | Self::Lte | Self::In | Self::Nin
        )
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// One typed comparison: `field op value`.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Field name the comparison targets
    pub field: String,
    /// Comparison operator
    pub op: CompareOp,
    /// Comparison value (for `In`/`Nin`: an array; scalars are coerced)
    pub value: Value,
}

impl Comparison {
    /// Create a comparison, normalizing the value for its operator.
    ///
    /// `In`/`Nin` scalars become single-element arrays. RFC 3339 strings in
    /// value comparisons are canonicalized to UTC microsecond precision.
    ///
    /// # Panics
    /// Panics if the field name is empty or oversized.
    #[must_use]
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        let field = field.into();
        let mut value = value.into();

        // Preconditions
        assert!(!field.is_empty(), "comparison field must not be empty");
        assert!(
            field.len() <= RECORD_FIELD_NAME_BYTES_MAX,
            "field {} bytes exceeds max {}",
            field.len(),
            RECORD_FIELD_NAME_BYTES_MAX
        );

        if matches!(op, CompareOp::In | CompareOp::Nin) && !value.is_array() {
            value = Value::Array(vec![value]);
        }
        if op.compares_values() {
            canonicalize_value(&mut value);
        }

        Self { field, op, value }
    }
}

/// Rewrite RFC 3339 strings (recursively through arrays) to UTC
/// microsecond precision so they compare as fixed-width text.
fn canonicalize_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(s) {
                *s = parsed
                    .with_timezone(&chrono::Utc)
                    .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
            }
        }
        Value::Array(items) => {
            for item in items {
                canonicalize_value(item);
            }
        }
        _ => {}
    }
}

// =============================================================================
// FilterSpec
// =============================================================================

/// An ordered set of comparisons, combined with AND.
///
/// Empty specifications match every record.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    comparisons: Vec<Comparison>,
}

impl FilterSpec {
    /// Create an empty specification (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw `field__operator` pairs into typed comparisons.
    ///
    /// This is the call boundary for the string mini-language: a key without
    /// a `__` suffix is exact-match equality; a key whose suffix is not a
    /// supported operator fails with
    /// [`StoreError::UnsupportedOperator`] before any I/O.
    ///
    /// # Errors
    /// `UnsupportedOperator` for an unrecognized suffix; `Validation` for an
    /// empty key or an oversized specification.
    pub fn parse<I, K>(pairs: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut spec = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            if key.is_empty() {
                return Err(StoreError::validation("filter key must not be empty"));
            }

            let (field, op) = match key.rsplit_once(FILTER_OPERATOR_SEPARATOR) {
                Some((field, suffix)) => match CompareOp::parse_suffix(suffix) {
                    Some(op) if !field.is_empty() => (field, op),
                    Some(_) => {
                        return Err(StoreError::validation(format!(
                            "filter key {key} has no field name"
                        )));
                    }
                    None => return Err(StoreError::unsupported_operator(suffix, key)),
                },
                None => (key, CompareOp::Eq),
            };

            if field.len() > RECORD_FIELD_NAME_BYTES_MAX {
                return Err(StoreError::validation(format!(
                    "filter field {} bytes exceeds max {}",
                    field.len(),
                    RECORD_FIELD_NAME_BYTES_MAX
                )));
            }
            spec.comparisons.push(Comparison::new(field, op, value));
            if spec.comparisons.len() > FILTER_COMPARISONS_COUNT_MAX {
                return Err(StoreError::validation(format!(
                    "filter exceeds {FILTER_COMPARISONS_COUNT_MAX} comparisons"
                )));
            }
        }
        Ok(spec)
    }

    /// Append a comparison.
    #[must_use]
    pub fn and(mut self, comparison: Comparison) -> Self {
        assert!(
            self.comparisons.len() < FILTER_COMPARISONS_COUNT_MAX,
            "filter exceeds {} comparisons",
            FILTER_COMPARISONS_COUNT_MAX
        );
        self.comparisons.push(comparison);
        self
    }

    /// Exact-match equality.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::Eq, value))
    }

    /// Not equal.
    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::Ne, value))
    }

    /// Greater than.
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::Gt, value))
    }

    /// Greater than or equal.
    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::Gte, value))
    }

    /// Less than.
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::Lt, value))
    }

    /// Less than or equal.
    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::Lte, value))
    }

    /// Membership in a list of values.
    #[must_use]
    pub fn is_in(self, field: impl Into<String>, values: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::In, values))
    }

    /// Absence from a list of values.
    #[must_use]
    pub fn not_in(self, field: impl Into<String>, values: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::Nin, values))
    }

    /// Substring (or array element) match.
    #[must_use]
    pub fn contains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::Contains, value))
    }

    /// Case-insensitive substring match.
    #[must_use]
    pub fn icontains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::IContains, value))
    }

    /// Anchored prefix match.
    #[must_use]
    pub fn starts_with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::StartsWith, value))
    }

    /// Anchored suffix match.
    #[must_use]
    pub fn ends_with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Comparison::new(field, CompareOp::EndsWith, value))
    }

    /// Field existence check: `true` matches absent fields, `false` matches
    /// present ones.
    #[must_use]
    pub fn is_null(self, field: impl Into<String>, null: bool) -> Self {
        self.and(Comparison::new(field, CompareOp::IsNull, null))
    }

    /// The accumulated comparisons, in insertion order.
    #[must_use]
    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    /// Whether this specification matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comparisons.is_empty()
    }

    /// If this specification is exactly one equality on `pk`, return the
    /// key. Drivers use this to turn a scan into a point lookup.
    #[must_use]
    pub fn as_pk_lookup(&self) -> Option<&str> {
        match self.comparisons.as_slice() {
            [Comparison {
                field,
                op: CompareOp::Eq,
                value: Value::String(pk),
            }] if field == "pk" => Some(pk),
            _ => None,
        }
    }

    // =========================================================================
    // In-memory predicate (key-value and memory backends)
    // =========================================================================

    /// Evaluate this specification against a record in memory.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.comparisons.iter().all(|c| comparison_matches(c, record))
    }

    // =========================================================================
    // Document translation (document backend)
    // =========================================================================

    /// Translate this specification into a native query document.
    ///
    /// `pk` is renamed to the document id field (`_id`). Multiple
    /// comparisons on one field merge into a single operator document
    /// (`{amount: {"$gte": 50, "$lte": 150}}`); a lone equality uses the
    /// plain shorthand form.
    ///
    /// # Errors
    /// `Serialization` if a comparison value cannot be represented.
    pub fn to_document(&self) -> StoreResult<bson::Document> {
        use bson::{Bson, Document};

        // field → list of (operator key, operand), in insertion order
        let mut constrained: Vec<(String, Vec<(String, Bson)>)> = Vec::new();

        for comparison in &self.comparisons {
            let field = document_field_name(&comparison.field);
            let (op_key, operand) = document_operator(comparison)?;

            match constrained.iter_mut().find(|(name, _)| *name == field) {
                Some((_, ops)) => ops.push((op_key, operand)),
                None => constrained.push((field, vec![(op_key, operand)])),
            }
        }

        let mut doc = Document::new();
        for (field, ops) in constrained {
            match ops.as_slice() {
                [(op_key, operand)] if op_key == "$eq" => {
                    // Lone equality uses the shorthand form
                    doc.insert(field, operand.clone());
                }
                _ => {
                    let mut inner = Document::new();
                    for (op_key, operand) in ops {
                        inner.insert(op_key, operand);
                    }
                    doc.insert(field, inner);
                }
            }
        }
        Ok(doc)
    }
}

/// Map a logical field name to its document-store form.
pub(crate) fn document_field_name(field: &str) -> String {
    if field == "pk" {
        "_id".to_string()
    } else {
        field.to_string()
    }
}

/// Translate one comparison to its `($operator, operand)` pair.
fn document_operator(comparison: &Comparison) -> StoreResult<(String, bson::Bson)> {
    use bson::Bson;

    let to_bson = |value: &Value| -> StoreResult<Bson> {
        bson::to_bson(value)
            .map_err(|e| StoreError::serialization(format!("filter value: {e}")))
    };
    let pattern = |value: &Value| -> String {
        escape_regex(value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()).as_str())
    };

    let pair = match comparison.op {
        CompareOp::Eq => ("$eq".to_string(), to_bson(&comparison.value)?),
        CompareOp::Ne => ("$ne".to_string(), to_bson(&comparison.value)?),
        CompareOp::Gt => ("$gt".to_string(), to_bson(&comparison.value)?),
        CompareOp::Gte => ("$gte".to_string(), to_bson(&comparison.value)?),
        CompareOp::Lt => ("$lt".to_string(), to_bson(&comparison.value)?),
        CompareOp::Lte => ("$lte".to_string(), to_bson(&comparison.value)?),
        CompareOp::In => ("$in".to_string(), to_bson(&comparison.value)?),
        CompareOp::Nin => ("$nin".to_string(), to_bson(&comparison.value)?),
        CompareOp::Contains => ("$regex".to_string(), Bson::String(pattern(&comparison.value))),
        CompareOp::IContains => (
            "$regex".to_string(),
            Bson::RegularExpression(bson::Regex {
                pattern: pattern(&comparison.value),
                options: "i".to_string(),
            }),
        ),
        CompareOp::StartsWith => (
            "$regex".to_string(),
            Bson::String(format!("^{}", pattern(&comparison.value))),
        ),
        CompareOp::EndsWith => (
            "$regex".to_string(),
            Bson::String(format!("{}$", pattern(&comparison.value))),
        ),
        CompareOp::IsNull => (
            "$exists".to_string(),
            Bson::Boolean(!value_truthy(&comparison.value)),
        ),
    };
    Ok(pair)
}

/// Escape regex metacharacters so user text matches literally.
fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

// =============================================================================
// Value comparison helpers
// =============================================================================

fn comparison_matches(comparison: &Comparison, record: &Record) -> bool {
    let resolved = record.field_value(&comparison.field);

    match comparison.op {
        CompareOp::IsNull => resolved.is_none() == value_truthy(&comparison.value),
        CompareOp::Eq => values_equal(&resolved.unwrap_or(Value::Null), &comparison.value),
        CompareOp::Ne => !values_equal(&resolved.unwrap_or(Value::Null), &comparison.value),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            let Some(actual) = resolved else { return false };
            let Some(ordering) = compare_for_order(&actual, &comparison.value) else {
                return false;
            };
            match comparison.op {
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Gte => ordering != Ordering::Less,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Lte => ordering != Ordering::Greater,
                _ => unreachable!(),
            }
        }
        CompareOp::In => in_matches(&resolved.unwrap_or(Value::Null), &comparison.value),
        CompareOp::Nin => !in_matches(&resolved.unwrap_or(Value::Null), &comparison.value),
        CompareOp::Contains => contains_matches(resolved.as_ref(), &comparison.value, false),
        CompareOp::IContains => contains_matches(resolved.as_ref(), &comparison.value, true),
        CompareOp::StartsWith => match (resolved.as_ref().and_then(Value::as_str), comparison.value.as_str()) {
            (Some(actual), Some(prefix)) => actual.starts_with(prefix),
            _ => false,
        },
        CompareOp::EndsWith => match (resolved.as_ref().and_then(Value::as_str), comparison.value.as_str()) {
            (Some(actual), Some(suffix)) => actual.ends_with(suffix),
            _ => false,
        },
    }
}

/// Membership test with the document backend's element-wise array
/// semantics: an array field matches when any element is in the list.
fn in_matches(actual: &Value, list: &Value) -> bool {
    let Some(candidates) = list.as_array() else {
        return false;
    };
    match actual {
        Value::Array(elements) => elements
            .iter()
            .any(|e| candidates.iter().any(|c| values_equal(e, c))),
        other => candidates.iter().any(|c| values_equal(other, c)),
    }
}

/// Substring match on strings; element-wise on array fields, mirroring how
/// the document backend applies a pattern to each array element.
fn contains_matches(actual: Option<&Value>, needle: &Value, case_insensitive: bool) -> bool {
    let Some(needle) = needle.as_str() else {
        return false;
    };
    let Some(actual) = actual else {
        return false;
    };

    let test = |text: &str| {
        if case_insensitive {
            text.to_lowercase().contains(&needle.to_lowercase())
        } else {
            text.contains(needle)
        }
    };

    match actual {
        Value::String(text) => test(text),
        Value::Array(elements) => elements.iter().any(|e| match e {
            Value::String(text) => test(text),
            other => values_equal(other, &Value::String(needle.to_string())),
        }),
        _ => false,
    }
}

/// Equality with numeric normalization: `100` equals `100.0`, the way the
/// document backend compares across integer and double encodings.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering between two values of the same kind; `None` for mixed or
/// unordered kinds (which never satisfy a range comparison).
pub(crate) fn compare_for_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let (x, y) = (a.as_f64()?, b.as_f64()?);
            x.partial_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order over values, used for client-side sorting: kinds rank
/// `Null < Bool < Number < String < Array < Object`, then within kind.
pub(crate) fn order_values(a: &Value, b: &Value) -> Ordering {
    fn kind_rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    let by_kind = kind_rank(a).cmp(&kind_rank(b));
    if by_kind != Ordering::Equal {
        return by_kind;
    }
    compare_for_order(a, b).unwrap_or(Ordering::Equal)
}

/// Truthiness for loosely-typed flag values (`isnull=1` behaves like
/// `isnull=true`).
fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// =============================================================================
// Tests
// =============================================================================
