//! Recursive-descent compiler for the filter expression language.
//!
//! ```text
//! expr     := and ( "||" and )*
//! and      := unary ( "&&" unary )*
//! unary    := "!" unary | primary
//! primary  := "(" expr ")"
//!           | path "." function "(" args ")"
//!           | path operator literal
//! operator := ["i"] ( "==" | "!=" | ">=" | "<=" | ">" | "<" )
//! literal  := string | integer | "true" | "false" | "null" | "DATE$" millis
//!           | "{" [ literal ( "," literal )* ] "}"
//! ```

use chrono::DateTime;
use std::fmt;

use super::ast::{BooleanOperation, CompositeFilter, Filter, FilterValue, LeafFilter, LogicalOperation, MatchMode};

/// A compile failure with the character offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError {
    pub message: String,
    pub position: usize,
}

impl FilterError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at position {})", self.message, self.position)
    }
}

impl std::error::Error for FilterError {}

/// Deepest nesting of groups, negations, lists and collection conditions accepted.
pub const MAX_NESTING: usize = 64;

/// Compile a filter expression into a [`Filter`].
///
/// # Errors
/// Returns a [`FilterError`] describing the first syntax problem, or an expression nested
/// deeper than [`MAX_NESTING`].
pub fn compile(source: &str) -> Result<Filter, FilterError> {
    compile_nested(source, 0)
}

fn compile_nested(source: &str, depth: usize) -> Result<Filter, FilterError> {
    let mut parser = Parser::new(source, depth);
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(FilterError::new("Empty filter expression", 0));
    }
    let filter = parser.parse_or()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(FilterError::new("Expected end-of-string", parser.pos));
    }
    Ok(filter)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(source: &str, depth: usize) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            depth,
        }
    }

    fn descend(&mut self) -> Result<(), FilterError> {
        if self.depth >= MAX_NESTING {
            return Err(FilterError::new("Expression nested too deeply", self.pos));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn looking_at(&self, token: &str) -> bool {
        token
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn consume(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.looking_at(token) {
            self.pos += token.chars().count();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: char, message: &str) -> Result<(), FilterError> {
        self.skip_whitespace();
        if self.peek() == Some(token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(FilterError::new(message, self.pos))
        }
    }

    fn parse_or(&mut self) -> Result<Filter, FilterError> {
        let mut children = vec![self.parse_and()?];
        while self.consume("||") {
            children.push(self.parse_and()?);
        }
        Ok(Self::collapse(BooleanOperation::Or, children))
    }

    fn parse_and(&mut self) -> Result<Filter, FilterError> {
        let mut children = vec![self.parse_unary()?];
        while self.consume("&&") {
            children.push(self.parse_unary()?);
        }
        Ok(Self::collapse(BooleanOperation::And, children))
    }

    fn collapse(operation: BooleanOperation, mut children: Vec<Filter>) -> Filter {
        if children.len() == 1 {
            children.remove(0)
        } else {
            Filter::Composite(CompositeFilter { operation, children })
        }
    }

    fn parse_unary(&mut self) -> Result<Filter, FilterError> {
        self.skip_whitespace();
        if self.peek() == Some('!') && self.peek_at(1) != Some('=') {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_unary()?;
            self.ascend();
            return Ok(Filter::not(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Filter, FilterError> {
        self.skip_whitespace();
        if self.peek() == Some('(') {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_or()?;
            self.ascend();
            self.expect(')', "Expected ')'")?;
            return Ok(inner);
        }

        let start = self.pos;
        let mut segments = vec![self.parse_identifier()?];
        while self.peek() == Some('.') {
            self.pos += 1;
            segments.push(self.parse_identifier()?);
        }

        if self.peek() == Some('(') {
            let function = segments.pop().unwrap_or_default();
            if segments.is_empty() {
                return Err(FilterError::new(format!("Unknown function: {function}"), start));
            }
            let property = segments.join(".");
            self.pos += 1;
            let filter = self.parse_function(property, &function, start)?;
            self.expect(')', "Expected ')'")?;
            return Ok(filter);
        }

        let property = segments.join(".");
        let (operation, ignore_case) = self.parse_operator()?;
        let value = self.parse_literal()?;
        Ok(Filter::Leaf(LeafFilter {
            property,
            operation,
            value,
            match_mode: None,
            ignore_case,
        }))
    }

    fn parse_identifier(&mut self) -> Result<String, FilterError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => self.pos += 1,
            _ => return Err(FilterError::new("Expected property name", start)),
        }
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_operator(&mut self) -> Result<(LogicalOperation, bool), FilterError> {
        const OPERATORS: [(&str, LogicalOperation); 6] = [
            ("==", LogicalOperation::Eq),
            ("!=", LogicalOperation::Ne),
            (">=", LogicalOperation::Ge),
            ("<=", LogicalOperation::Le),
            (">", LogicalOperation::Gt),
            ("<", LogicalOperation::Lt),
        ];
        self.skip_whitespace();
        let ignore_case = self.peek() == Some('i')
            && matches!(self.peek_at(1), Some('=' | '!' | '<' | '>'));
        if ignore_case {
            self.pos += 1;
        }
        for (token, operation) in OPERATORS {
            if self.looking_at(token) {
                self.pos += token.len();
                return Ok((operation, ignore_case));
            }
        }
        Err(FilterError::new("Expected operator", self.pos))
    }

    fn parse_function(&mut self, property: String, function: &str, start: usize) -> Result<Filter, FilterError> {
        let (base, ignore_case) = function
            .strip_suffix("IgnoreCase")
            .map_or((function, false), |base| (base, true));

        let like_mode = match base {
            "startsWith" => Some(MatchMode::Start),
            "endsWith" => Some(MatchMode::End),
            "contains" => Some(MatchMode::Anywhere),
            _ => None,
        };
        if let Some(mode) = like_mode {
            let value = self.parse_literal()?;
            return Ok(Filter::Leaf(LeafFilter {
                property,
                operation: LogicalOperation::Like,
                value,
                match_mode: Some(mode),
                ignore_case,
            }));
        }

        let filter = match (base, ignore_case) {
            ("in" | "containsAll", _) => {
                let operation = if base == "in" {
                    LogicalOperation::In
                } else {
                    LogicalOperation::ContainsAll
                };
                let value = match self.parse_literal()? {
                    list @ FilterValue::List(_) => list,
                    single => FilterValue::List(vec![single]),
                };
                Filter::Leaf(LeafFilter {
                    property,
                    operation,
                    value,
                    match_mode: None,
                    ignore_case,
                })
            }
            ("isNull", false) => Filter::is_null(property),
            ("notNull", false) => Filter::not_null(property),
            ("isEmpty", false) => Filter::is_empty(property),
            ("join" | "leftJoin", false) => {
                let mut target = vec![self.parse_identifier()?];
                while self.peek() == Some('.') {
                    self.pos += 1;
                    target.push(self.parse_identifier()?);
                }
                if base == "join" {
                    Filter::join(property, target.join("."))
                } else {
                    Filter::left_join(property, target.join("."))
                }
            }
            ("collectionCondition", false) => {
                let inner_start = self.pos;
                let FilterValue::Text(source) = self.parse_literal()? else {
                    return Err(FilterError::new("Expected literal value.", inner_start));
                };
                let condition = compile_nested(&source, self.depth + 1).map_err(|e| {
                    FilterError::new(e.message, inner_start + e.position)
                })?;
                Filter::collection(property, condition)
            }
            _ => {
                return Err(FilterError::new(format!("Unknown function: {function}"), start));
            }
        };
        Ok(filter)
    }

    fn parse_list_items(&mut self) -> Result<Vec<FilterValue>, FilterError> {
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_literal()?);
            if self.consume(",") {
                continue;
            }
            self.expect('}', "Expected '}'")?;
            return Ok(items);
        }
    }

    fn parse_literal(&mut self) -> Result<FilterValue, FilterError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some('"') => self.parse_string().map(FilterValue::Text),
            Some('{') => {
                self.pos += 1;
                self.descend()?;
                let items = self.parse_list_items()?;
                self.ascend();
                Ok(FilterValue::List(items))
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                self.pos += 1;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                text.parse::<i64>()
                    .map(FilterValue::Integer)
                    .map_err(|_| FilterError::new("Expected literal value.", start))
            }
            _ => {
                if self.looking_at("DATE$") {
                    self.pos += 5;
                    let digits_start = self.pos;
                    while self.peek().is_some_and(|c| c == '-' || c.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    let digits: String = self.chars[digits_start..self.pos].iter().collect();
                    return digits
                        .parse::<i64>()
                        .ok()
                        .and_then(DateTime::from_timestamp_millis)
                        .map(FilterValue::Date)
                        .ok_or_else(|| FilterError::new("Expected literal value.", start));
                }
                for (keyword, value) in [
                    ("true", FilterValue::Boolean(true)),
                    ("false", FilterValue::Boolean(false)),
                    ("null", FilterValue::Null),
                ] {
                    if self.looking_at(keyword)
                        && !self
                            .peek_at(keyword.len())
                            .is_some_and(|c| c.is_alphanumeric() || c == '_')
                    {
                        self.pos += keyword.len();
                        return Ok(value);
                    }
                }
                Err(FilterError::new("Expected literal value.", start))
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, FilterError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(FilterError::new("Unterminated string literal", start)),
                Some('"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        None => {
                            return Err(FilterError::new("Unterminated string literal", start));
                        }
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}
