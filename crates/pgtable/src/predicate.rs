//! Predicate normalization and serialization.
//!
//! Filters arrive in three notations and all end up as one canonical
//! [`Predicate`] (column, operator, operand):
//!
//! - keyword equality: [`Filter::eq`]`("id", 1)`
//! - ordered triple: `("id", ">", 0)` or [`PredicateInput::Triple`]
//! - free text: `"id > 0"`, `"name not contains bob"`, `"bob contains name"`
//!
//! Each predicate serializes to one parenthesized [`Sql`] fragment with its value
//! bound, e.g. `("id" > $1)`. Only validated identifiers and the fixed operator
//! vocabulary become SQL text.

use crate::error::{TableError, TableResult};
use crate::ident::Ident;
use crate::schema::TableSchema;
use crate::sql::Sql;
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// Every operator spelling accepted by the normalizer.
pub const ALLOWED_OPERATORS: &[&str] = &[
    "not",
    "<>",
    "!=",
    "=",
    "<",
    ">",
    ">=",
    "<=",
    "is",
    "is not",
    "between",
    "not between",
    "contains",
    "not contains",
    "like",
    "not like",
    "in",
    "not in",
];

/// Supported predicate operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `not`, treated as `<>`
    Not,
    /// `<>`
    Ne,
    /// `!=`, translated to `<>`
    BangNe,
    Eq,
    Lt,
    Gt,
    Gte,
    Lte,
    Is,
    IsNot,
    Between,
    NotBetween,
    /// Substring match, translated to `LIKE '%value%'`
    Contains,
    NotContains,
    /// Raw pattern match
    Like,
    NotLike,
    /// Column value contained in the given value (operands reversed)
    In,
    NotIn,
}

impl Operator {
    /// Parse an operator spelling (case-insensitive, inner whitespace collapsed).
    pub fn parse(s: &str) -> TableResult<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let op = match normalized.as_str() {
            "not" => Operator::Not,
            "<>" => Operator::Ne,
            "!=" => Operator::BangNe,
            "=" => Operator::Eq,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "<=" => Operator::Lte,
            "is" => Operator::Is,
            "is not" => Operator::IsNot,
            "between" => Operator::Between,
            "not between" => Operator::NotBetween,
            "contains" => Operator::Contains,
            "not contains" => Operator::NotContains,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            _ => {
                return Err(TableError::UnsupportedOperator {
                    operator: s.to_string(),
                    allowed: ALLOWED_OPERATORS,
                });
            }
        };
        Ok(op)
    }

    /// The caller-facing spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Not => "not",
            Operator::Ne => "<>",
            Operator::BangNe => "!=",
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Is => "is",
            Operator::IsNot => "is not",
            Operator::Between => "between",
            Operator::NotBetween => "not between",
            Operator::Contains => "contains",
            Operator::NotContains => "not contains",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::In => "in",
            Operator::NotIn => "not in",
        }
    }

    /// The engine token after canonical-name translation.
    pub fn sql_token(self) -> &'static str {
        match self {
            Operator::Not | Operator::Ne | Operator::BangNe => "<>",
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::Contains | Operator::Like | Operator::In => "LIKE",
            Operator::NotContains | Operator::NotLike | Operator::NotIn => "NOT LIKE",
        }
    }

    /// `between` / `not between`: the operand is a pair.
    pub fn is_range(self) -> bool {
        matches!(self, Operator::Between | Operator::NotBetween)
    }

    /// String-matching operators, compared on the column's text form.
    pub fn is_containment(self) -> bool {
        matches!(
            self,
            Operator::Contains
                | Operator::NotContains
                | Operator::Like
                | Operator::NotLike
                | Operator::In
                | Operator::NotIn
        )
    }

    /// `in` / `not in`: value tested against the column, operands reversed.
    pub fn is_reversed(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    fn wraps_wildcards(self) -> bool {
        matches!(self, Operator::Contains | Operator::NotContains)
    }

    fn is_negated_equality(self) -> bool {
        matches!(
            self,
            Operator::Not | Operator::Ne | Operator::BangNe | Operator::IsNot
        )
    }

    fn is_equality(self) -> bool {
        matches!(self, Operator::Eq | Operator::Is)
    }
}

impl FromStr for Operator {
    type Err = TableError;

    fn from_str(s: &str) -> TableResult<Self> {
        Operator::parse(s)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate's right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(Value),
    /// Lower and upper bound for range operators.
    Pair(Value, Value),
}

impl Operand {
    pub fn pair(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Operand::Pair(low.into(), high.into())
    }
}

macro_rules! operand_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Single(v.into())
                }
            }
        )*
    };
}

operand_from!(Value, &str, String, bool, i32, i64, f64);

/// A filter condition in one of the accepted notations.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateInput {
    /// `column = value`
    Keyword { column: String, value: Value },
    /// `(column, operator, value)`; must have exactly three parts, the first two text.
    Triple(Vec<Operand>),
    /// `"column operator value"` or `"value [not] contains column"`.
    Text(String),
}

impl PredicateInput {
    pub fn keyword(column: impl Into<String>, value: impl Into<Value>) -> Self {
        PredicateInput::Keyword {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn triple(column: &str, operator: &str, operand: impl Into<Operand>) -> Self {
        PredicateInput::Triple(vec![
            Operand::from(column),
            Operand::from(operator),
            operand.into(),
        ])
    }

    pub fn range(
        column: &str,
        operator: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::triple(column, operator, Operand::pair(low, high))
    }
}

impl<V: Into<Value>> From<(&str, &str, V)> for PredicateInput {
    fn from((column, operator, value): (&str, &str, V)) -> Self {
        PredicateInput::triple(column, operator, Operand::Single(value.into()))
    }
}

impl From<&str> for PredicateInput {
    fn from(text: &str) -> Self {
        PredicateInput::Text(text.to_string())
    }
}

impl From<String> for PredicateInput {
    fn from(text: String) -> Self {
        PredicateInput::Text(text)
    }
}

/// A canonical, validated predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    column: Ident,
    operator: Operator,
    operand: Operand,
}

impl Predicate {
    /// Build a predicate, checking that the operand shape fits the operator.
    pub fn new(column: Ident, operator: Operator, operand: Operand) -> TableResult<Self> {
        match (&operand, operator.is_range()) {
            (Operand::Single(_), true) => {
                return Err(TableError::malformed(format!(
                    "'{}' on column '{}' needs a pair of values",
                    operator, column
                )));
            }
            (Operand::Pair(..), false) => {
                return Err(TableError::malformed(format!(
                    "'{}' on column '{}' takes a single value, got a pair",
                    operator, column
                )));
            }
            _ => {}
        }
        Ok(Self {
            column,
            operator,
            operand,
        })
    }

    pub fn column(&self) -> &Ident {
        &self.column
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Serialize to a parenthesized fragment, e.g. `("id" > $1)`.
    ///
    /// With a `qualifier` a bare column is rendered as `"table"."column"`.
    pub fn to_sql(&self, qualifier: Option<&Ident>) -> Sql {
        let column = match qualifier {
            Some(table) if self.column.depth() == 1 => table.join(&self.column),
            _ => self.column.clone(),
        };
        let op = self.operator;
        let mut sql = Sql::new("(");

        match &self.operand {
            Operand::Pair(low, high) => {
                sql.push_ident(&column).push(" ").push(op.sql_token()).push(" ");
                push_value(&mut sql, low);
                sql.push(" AND ");
                push_value(&mut sql, high);
            }
            Operand::Single(value) if op.is_reversed() => {
                push_value(&mut sql, value);
                sql.push(" ")
                    .push(op.sql_token())
                    .push(" ('%' || ")
                    .push_ident(&column)
                    .push("::text || '%')");
            }
            Operand::Single(value) if op.is_containment() => {
                sql.push_ident(&column)
                    .push("::text ")
                    .push(op.sql_token())
                    .push(" ");
                match value.to_text() {
                    Some(text) if op.wraps_wildcards() => {
                        sql.push_bind(format!("%{}%", escape_like(&text)));
                    }
                    _ => push_value(&mut sql, value),
                }
            }
            Operand::Single(Value::Null) if op.is_equality() => {
                sql.push_ident(&column).push(" IS NULL");
            }
            Operand::Single(Value::Null) if op.is_negated_equality() => {
                sql.push_ident(&column).push(" IS NOT NULL");
            }
            Operand::Single(Value::Bool(b)) if matches!(op, Operator::Is | Operator::IsNot) => {
                sql.push_ident(&column)
                    .push(" ")
                    .push(op.sql_token())
                    .push(if *b { " TRUE" } else { " FALSE" });
            }
            Operand::Single(value) if matches!(op, Operator::Is | Operator::IsNot) => {
                let token = if op == Operator::Is {
                    " IS NOT DISTINCT FROM "
                } else {
                    " IS DISTINCT FROM "
                };
                sql.push_ident(&column).push(token);
                push_value(&mut sql, value);
            }
            Operand::Single(value) => {
                sql.push_ident(&column).push(" ").push(op.sql_token()).push(" ");
                push_value(&mut sql, value);
            }
        }

        sql.push(")");
        sql
    }
}

/// NULL is rendered as the literal marker, everything else is bound.
fn push_value(sql: &mut Sql, value: &Value) {
    if value.is_null() {
        sql.push("NULL");
    } else {
        sql.push_bind(value.clone());
    }
}

/// Escape LIKE metacharacters so `contains` matches the value literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

// ==================== Normalization ====================

/// Normalize any accepted notation into a canonical predicate.
///
/// When a schema is presented, the referenced column must exist in it.
pub fn normalize(input: &PredicateInput, schema: Option<&TableSchema>) -> TableResult<Predicate> {
    match input {
        PredicateInput::Keyword { column, value } => Predicate::new(
            resolve_column(column, schema)?,
            Operator::Eq,
            Operand::Single(value.clone()),
        ),
        PredicateInput::Triple(parts) => normalize_triple(parts, schema),
        PredicateInput::Text(text) => normalize_text(text, schema),
    }
}

/// Normalize every input of a filter, in order.
pub fn normalize_all(filter: &Filter, schema: Option<&TableSchema>) -> TableResult<Vec<Predicate>> {
    filter.inputs().iter().map(|p| normalize(p, schema)).collect()
}

fn resolve_column(name: &str, schema: Option<&TableSchema>) -> TableResult<Ident> {
    match schema {
        Some(schema) if schema.has_column(name) => Ident::exact(name),
        Some(schema) => Err(TableError::UnknownColumn {
            column: name.to_string(),
            table: schema.table().to_string(),
            available: schema.column_names(),
        }),
        None => Ident::parse(name),
    }
}

fn text_part<'a>(part: &'a Operand, what: &str) -> TableResult<&'a str> {
    match part {
        Operand::Single(Value::Text(s)) => Ok(s),
        other => Err(TableError::malformed(format!(
            "{what} must be text, got {other:?}"
        ))),
    }
}

fn normalize_triple(parts: &[Operand], schema: Option<&TableSchema>) -> TableResult<Predicate> {
    let [column, operator, operand] = parts else {
        return Err(TableError::malformed(format!(
            "each predicate needs 3 parts (column, operator, value), got {}",
            parts.len()
        )));
    };
    let column = text_part(column, "column")?;
    let operator = Operator::parse(text_part(operator, "operator")?)?;
    Predicate::new(resolve_column(column, schema)?, operator, operand.clone())
}

#[derive(Debug)]
struct Token {
    text: String,
    quoted: bool,
}

impl Token {
    /// The bound value for this token. Against a text-typed column every unquoted
    /// token except `null` stays text.
    fn literal(&self, column_type: Option<&str>) -> Value {
        if self.quoted {
            return Value::Text(self.text.clone());
        }
        match parse_literal(&self.text) {
            Value::Null => Value::Null,
            _ if column_type.is_some_and(is_text_type) => Value::Text(self.text.clone()),
            value => value,
        }
    }

    fn is_word(&self, word: &str) -> bool {
        !self.quoted && self.text.eq_ignore_ascii_case(word)
    }
}

/// Split on whitespace; single or double quotes keep a token together.
fn tokenize(text: &str) -> TableResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '\'' || c == '"' {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some(q) if q == c && chars.peek() == Some(&c) => {
                        chars.next();
                        value.push(c);
                    }
                    Some(q) if q == c => break,
                    Some(other) => value.push(other),
                    None => {
                        return Err(TableError::malformed(format!(
                            "unterminated quote in '{text}'"
                        )));
                    }
                }
            }
            tokens.push(Token {
                text: value,
                quoted: true,
            });
            continue;
        }
        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(Token {
            text: word,
            quoted: false,
        });
    }
    Ok(tokens)
}

fn is_text_type(data_type: &str) -> bool {
    let ty = data_type.to_ascii_lowercase();
    ["text", "character", "varchar", "char", "bpchar", "citext", "name"]
        .iter()
        .any(|prefix| ty.starts_with(prefix))
}

/// Read an unquoted token: null, booleans and numbers become typed values.
///
/// A number is typed only when it prints back as the same token; `01234`, `1.10`
/// and `1e3` stay text so the server sees exactly what was written.
fn parse_literal(token: &str) -> Value {
    if token.eq_ignore_ascii_case("null") || token.eq_ignore_ascii_case("none") {
        return Value::Null;
    }
    if token.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if token.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(v) = token.parse::<i64>() {
        if v.to_string() == token {
            return Value::Int(v);
        }
    } else if let Ok(v) = token.parse::<f64>() {
        if v.is_finite() && v.to_string() == token {
            return Value::Float(v);
        }
    }
    Value::Text(token.to_string())
}

fn column_type<'a>(column: &str, schema: Option<&'a TableSchema>) -> Option<&'a str> {
    schema
        .and_then(|s| s.column(column))
        .map(|c| c.data_type.as_str())
}

fn normalize_text(text: &str, schema: Option<&TableSchema>) -> TableResult<Predicate> {
    let tokens = tokenize(text)?;
    if tokens.len() < 3 {
        return Err(TableError::malformed(format!(
            "'{text}' must read 'column operator value'"
        )));
    }

    // Two-word operators win over a one-word operator followed by a value.
    let two_word = (!tokens[1].quoted && !tokens[2].quoted)
        .then(|| format!("{} {}", tokens[1].text, tokens[2].text))
        .and_then(|s| Operator::parse(&s).ok());
    let (operator, rest) = match two_word {
        Some(op) => (op, &tokens[3..]),
        None if tokens[1].quoted => {
            return Err(TableError::UnsupportedOperator {
                operator: tokens[1].text.clone(),
                allowed: ALLOWED_OPERATORS,
            });
        }
        None => (Operator::parse(&tokens[1].text)?, &tokens[2..]),
    };

    let first = &tokens[0];
    if operator.is_range() {
        let column_type = column_type(&first.text, schema);
        return match rest {
            [low, and, high] if and.is_word("and") => Predicate::new(
                resolve_column(&first.text, schema)?,
                operator,
                Operand::Pair(low.literal(column_type), high.literal(column_type)),
            ),
            _ => Err(TableError::malformed(format!(
                "'{text}' must read 'column {operator} low and high'"
            ))),
        };
    }

    let [last] = rest else {
        return Err(TableError::malformed(format!(
            "'{text}' must read 'column operator value' with exactly one value"
        )));
    };

    // "value [not] contains column": the column is on the right.
    let reversed = matches!(operator, Operator::Contains | Operator::NotContains)
        && schema.is_some_and(|s| !s.has_column(&first.text) && s.has_column(&last.text));
    let (column, value) = if reversed {
        (&last.text, first)
    } else {
        (&first.text, last)
    };
    let value = value.literal(column_type(column, schema));

    Predicate::new(
        resolve_column(column, schema)?,
        operator,
        Operand::Single(value),
    )
}

// ==================== Filter ====================

/// An ordered list of predicate inputs, combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    inputs: Vec<PredicateInput>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyword equality `column = value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.push(PredicateInput::keyword(column, value));
        self
    }

    /// Add a predicate in any notation.
    pub fn and(mut self, input: impl Into<PredicateInput>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Add a range predicate (`between` / `not between`).
    pub fn range(
        self,
        column: &str,
        operator: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.and(PredicateInput::range(column, operator, low, high))
    }

    pub(crate) fn push(&mut self, input: PredicateInput) {
        self.inputs.push(input);
    }

    pub fn inputs(&self) -> &[PredicateInput] {
        &self.inputs
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// The lone keyword equality, when the filter is exactly that.
    pub fn single_equality(&self) -> Option<(&str, &Value)> {
        match self.inputs.as_slice() {
            [PredicateInput::Keyword { column, value }] => Some((column, value)),
            _ => None,
        }
    }
}

impl From<PredicateInput> for Filter {
    fn from(input: PredicateInput) -> Self {
        Filter {
            inputs: vec![input],
        }
    }
}

impl From<Vec<PredicateInput>> for Filter {
    fn from(inputs: Vec<PredicateInput>) -> Self {
        Filter { inputs }
    }
}

impl<V: Into<Value>> From<(&str, &str, V)> for Filter {
    fn from(triple: (&str, &str, V)) -> Self {
        Filter::from(PredicateInput::from(triple))
    }
}

impl From<&str> for Filter {
    fn from(text: &str) -> Self {
        Filter::from(PredicateInput::from(text))
    }
}

#[cfg(test)]
mod tests;
