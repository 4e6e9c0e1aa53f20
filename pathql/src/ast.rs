//! Abstract Syntax Tree for PathQL
//!
//! Statements can be built two ways: parsed from the textual form (see
//! [`crate::parse`]) or assembled directly through the builder functions on
//! [`Exp`] and [`PathStep`]. The builder surface is the primary API for
//! programs; the textual form exists for the CLI.

use serde::{Deserialize, Serialize};

/// A complete PathQL statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(SelectStmt),
    Modify(ModifyStmt),
}

/// SELECT statement: walk a context chain and return matching substructure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStmt {
    /// Bin whose value the path is applied to
    pub bin: String,
    /// Context chain
    pub steps: Vec<PathStep>,
    /// Return mode and tolerance flags
    pub selection: Selection,
}

/// MODIFY statement: rewrite every node matched by the context chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyStmt {
    /// Bin whose value the path is applied to
    pub bin: String,
    /// Context chain
    pub steps: Vec<PathStep>,
    /// SET clause applied to each matched node
    pub set: SetClause,
    /// Write the rewritten value to this bin instead of in place
    pub target_bin: Option<String>,
    /// Tolerate malformed nested data while matching
    pub no_fail: bool,
}

/// SET clause in MODIFY: `SET key = expr` over the matched map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetClause {
    pub key: String,
    pub value: Exp,
}

/// One step of a context chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathStep {
    /// Every child of the current map or list
    AllChildren,
    /// Children passing a filter predicate
    Filtered(Exp),
    /// A single map key
    Key(String),
    /// A single list index
    Index(i64),
}

impl PathStep {
    pub fn all_children() -> Self {
        PathStep::AllChildren
    }

    pub fn filtered(filter: Exp) -> Self {
        PathStep::Filtered(filter)
    }

    pub fn key(key: impl Into<String>) -> Self {
        PathStep::Key(key.into())
    }

    pub fn index(index: i64) -> Self {
        PathStep::Index(index)
    }
}

/// What a SELECT returns for the matched nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectMode {
    /// The original structure pruned to matching descendants
    Tree,
    /// The matched values, flattened
    Values,
    /// The matched nodes' map keys (or list indexes)
    Keys,
    /// Just how many nodes matched
    Count,
}

/// Return mode plus tolerance flags for SELECT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub mode: SelectMode,
    /// Treat malformed nested data as a non-match instead of an error
    pub no_fail: bool,
}

impl Selection {
    pub fn tree() -> Self {
        Self { mode: SelectMode::Tree, no_fail: false }
    }

    pub fn values() -> Self {
        Self { mode: SelectMode::Values, no_fail: false }
    }

    pub fn keys() -> Self {
        Self { mode: SelectMode::Keys, no_fail: false }
    }

    pub fn count() -> Self {
        Self { mode: SelectMode::Count, no_fail: false }
    }

    pub fn no_fail(mut self) -> Self {
        self.no_fail = true;
        self
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::tree()
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Expected shape of a value fetched with [`Exp::map_get`]
///
/// `Any` skips the check; everything else raises a type mismatch when the
/// stored value has a different shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Any,
    Bool,
    Int,
    Float,
    String,
    List,
    Map,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Any => "any",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::List => "list",
            ValueType::Map => "map",
        }
    }
}

/// Which part of the loop variable an expression refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopVar {
    /// The element currently being iterated
    Value,
    /// Its map key
    Key,
    /// Its list index
    Index,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Expression in a filter predicate or SET clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Exp {
    /// Literal value
    Literal(Literal),
    /// Loop variable reference
    Loop(LoopVar),
    /// Map lookup with a declared expected type
    MapGet {
        key: Box<Exp>,
        expected: ValueType,
        map: Box<Exp>,
    },
    /// Binary operation
    Binary {
        left: Box<Exp>,
        op: BinaryOp,
        right: Box<Exp>,
    },
    /// Unary operation
    Unary {
        op: UnaryOp,
        exp: Box<Exp>,
    },
    /// Regex match against a string operand
    Regex {
        pattern: String,
        exp: Box<Exp>,
    },
    /// Map copy with one entry replaced; evaluates to the updated map
    MapPut {
        key: Box<Exp>,
        value: Box<Exp>,
        map: Box<Exp>,
    },
}

impl Exp {
    /// Literal expression
    pub fn val(value: impl Into<Literal>) -> Self {
        Exp::Literal(value.into())
    }

    /// The element currently being iterated
    pub fn loop_value() -> Self {
        Exp::Loop(LoopVar::Value)
    }

    /// The map key of the element currently being iterated
    pub fn loop_key() -> Self {
        Exp::Loop(LoopVar::Key)
    }

    /// The list index of the element currently being iterated
    pub fn loop_index() -> Self {
        Exp::Loop(LoopVar::Index)
    }

    /// Look a key up on a map-valued expression, checking the result's shape
    pub fn map_get(key: impl Into<Exp>, expected: ValueType, map: Exp) -> Self {
        Exp::MapGet {
            key: Box::new(key.into()),
            expected,
            map: Box::new(map),
        }
    }

    /// Copy a map-valued expression with one entry replaced
    pub fn map_put(key: impl Into<Exp>, value: Exp, map: Exp) -> Self {
        Exp::MapPut {
            key: Box::new(key.into()),
            value: Box::new(value),
            map: Box::new(map),
        }
    }

    /// Regex match against a string-valued expression
    pub fn regex_match(pattern: impl Into<String>, exp: Exp) -> Self {
        Exp::Regex {
            pattern: pattern.into(),
            exp: Box::new(exp),
        }
    }

    pub fn eq(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Eq, right)
    }

    pub fn ne(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Ne, right)
    }

    pub fn lt(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Lt, right)
    }

    pub fn le(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Le, right)
    }

    pub fn gt(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Gt, right)
    }

    pub fn ge(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Ge, right)
    }

    pub fn and(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::And, right)
    }

    pub fn or(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Or, right)
    }

    pub fn add(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Add, right)
    }

    pub fn sub(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Sub, right)
    }

    pub fn mul(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Mul, right)
    }

    pub fn div(left: Exp, right: Exp) -> Self {
        Self::binary(left, BinaryOp::Div, right)
    }

    pub fn not(exp: Exp) -> Self {
        Exp::Unary { op: UnaryOp::Not, exp: Box::new(exp) }
    }

    pub fn neg(exp: Exp) -> Self {
        Exp::Unary { op: UnaryOp::Neg, exp: Box::new(exp) }
    }

    fn binary(left: Exp, op: BinaryOp, right: Exp) -> Self {
        Exp::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Int(i)
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Literal::Int(i as i64)
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<Literal> for Exp {
    fn from(lit: Literal) -> Self {
        Exp::Literal(lit)
    }
}

impl From<bool> for Exp {
    fn from(b: bool) -> Self {
        Exp::Literal(Literal::Bool(b))
    }
}

impl From<i64> for Exp {
    fn from(i: i64) -> Self {
        Exp::Literal(Literal::Int(i))
    }
}

impl From<i32> for Exp {
    fn from(i: i32) -> Self {
        Exp::Literal(Literal::Int(i as i64))
    }
}

impl From<f64> for Exp {
    fn from(f: f64) -> Self {
        Exp::Literal(Literal::Float(f))
    }
}

impl From<&str> for Exp {
    fn from(s: &str) -> Self {
        Exp::Literal(Literal::String(s.to_string()))
    }
}

impl From<String> for Exp {
    fn from(s: String) -> Self {
        Exp::Literal(Literal::String(s))
    }
}

impl SelectStmt {
    pub fn new(bin: impl Into<String>, steps: Vec<PathStep>, selection: Selection) -> Self {
        Self { bin: bin.into(), steps, selection }
    }
}
