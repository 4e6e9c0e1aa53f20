//! Filter expression evaluation
//!
//! Evaluates [`pathql::Exp`] trees against one enumerated element at a time.
//! The loop variable always refers to the innermost enumeration: when filters
//! appear at several depths of a path, each filter sees the element its own
//! step is iterating.
//!
//! Typing is strict. Operand shapes are checked, declared expected types on
//! map lookups are enforced, and violations surface as type mismatch errors
//! rather than silent coercions. The one deliberate soft spot: looking up an
//! absent key yields Null, and equality against Null is simply false, so
//! records missing optional fields filter out instead of erroring.

use std::cmp::Ordering;

use pathql::{BinaryOp, Exp, Literal, LoopVar, UnaryOp, ValueType};
use regex::Regex;

use crate::error::{Error, Result};
use crate::storage::record::Value;

/// Where the current element sits inside its parent
#[derive(Debug, Clone, Copy)]
pub enum Binding<'a> {
    /// Entry of a map, bound to its key
    MapKey(&'a str),
    /// Element of a list, bound to its position
    ListIndex(usize),
    /// Root of the path; no enclosing enumeration
    Root,
}

/// One enumerated element: the value plus its binding in the parent
#[derive(Debug, Clone, Copy)]
pub struct LoopScope<'a> {
    pub binding: Binding<'a>,
    pub value: &'a Value,
}

impl<'a> LoopScope<'a> {
    pub fn map_entry(key: &'a str, value: &'a Value) -> Self {
        Self { binding: Binding::MapKey(key), value }
    }

    pub fn list_entry(index: usize, value: &'a Value) -> Self {
        Self { binding: Binding::ListIndex(index), value }
    }

    pub fn root(value: &'a Value) -> Self {
        Self { binding: Binding::Root, value }
    }
}

/// Evaluate a filter predicate to a boolean.
///
/// The predicate must evaluate to a bool; anything else is a type mismatch.
pub fn matches(exp: &Exp, scope: &LoopScope) -> Result<bool> {
    expect_bool(evaluate(exp, scope)?)
}

/// Evaluate an expression against the current loop scope
pub fn evaluate(exp: &Exp, scope: &LoopScope) -> Result<Value> {
    match exp {
        Exp::Literal(lit) => Ok(literal_value(lit)),

        Exp::Loop(LoopVar::Value) => Ok(scope.value.clone()),

        Exp::Loop(LoopVar::Key) => match scope.binding {
            Binding::MapKey(key) => Ok(Value::String(key.to_string())),
            Binding::ListIndex(_) => Err(Error::TypeMismatch {
                expected: "map entry",
                actual: "list element",
            }),
            Binding::Root => Err(Error::TypeMismatch {
                expected: "map entry",
                actual: "path root",
            }),
        },

        Exp::Loop(LoopVar::Index) => match scope.binding {
            Binding::ListIndex(index) => Ok(Value::Int(index as i64)),
            Binding::MapKey(_) => Err(Error::TypeMismatch {
                expected: "list element",
                actual: "map entry",
            }),
            Binding::Root => Err(Error::TypeMismatch {
                expected: "list element",
                actual: "path root",
            }),
        },

        Exp::MapGet { key, expected, map } => {
            let key = evaluate_string(key, scope)?;
            let map_value = evaluate(map, scope)?;
            let entries = map_value.as_map().ok_or(Error::TypeMismatch {
                expected: "map",
                actual: map_value.type_name(),
            })?;

            // Absent keys resolve to Null; the declared type only constrains
            // values that are actually present.
            let found = entries.get(&key).cloned().unwrap_or(Value::Null);
            if !found.is_null() {
                check_expected_type(&found, *expected)?;
            }
            Ok(found)
        }

        Exp::Binary { left, op, right } => evaluate_binary(left, *op, right, scope),

        Exp::Unary { op, exp } => {
            let value = evaluate(exp, scope)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!expect_bool(value)?)),
                UnaryOp::Neg => match value {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(Error::TypeMismatch {
                        expected: "number",
                        actual: other.type_name(),
                    }),
                },
            }
        }

        Exp::Regex { pattern, exp } => {
            let text = evaluate_string(exp, scope)?;
            let re = Regex::new(pattern).map_err(|e| Error::InvalidRegex {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            Ok(Value::Bool(re.is_match(&text)))
        }

        Exp::MapPut { key, value, map } => {
            let key = evaluate_string(key, scope)?;
            let new_value = evaluate(value, scope)?;
            let map_value = evaluate(map, scope)?;
            match map_value {
                Value::Map(mut entries) => {
                    entries.insert(key, new_value);
                    Ok(Value::Map(entries))
                }
                other => Err(Error::TypeMismatch {
                    expected: "map",
                    actual: other.type_name(),
                }),
            }
        }
    }
}

fn evaluate_binary(left: &Exp, op: BinaryOp, right: &Exp, scope: &LoopScope) -> Result<Value> {
    // Logical operators short-circuit
    match op {
        BinaryOp::And => {
            if !matches(left, scope)? {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(matches(right, scope)?));
        }
        BinaryOp::Or => {
            if matches(left, scope)? {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(matches(right, scope)?));
        }
        _ => {}
    }

    let lhs = evaluate(left, scope)?;
    let rhs = evaluate(right, scope)?;

    // Ordering against an absent value is a non-match, not an error
    if matches!(op, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
        && (lhs.is_null() || rhs.is_null())
    {
        return Ok(Value::Bool(false));
    }

    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Lt => Ok(Value::Bool(compare(&lhs, &rhs)? == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(&lhs, &rhs)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(&lhs, &rhs)? == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(&lhs, &rhs)? != Ordering::Less)),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            arithmetic(&lhs, op, &rhs)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// Equality across values.
///
/// Ints and floats compare numerically; any other shape mismatch is simply
/// not equal rather than an error.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(a), Value::Float(b)) => (*a as f64) == *b,
        (Value::Float(a), Value::Int(b)) => *a == (*b as f64),
        _ => lhs == rhs,
    }
}

/// Ordering across values. Shape mismatches here are errors.
fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => Ok(a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        (Value::Int(a), Value::Float(b)) => {
            Ok((*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal))
        }
        (Value::Float(a), Value::Int(b)) => {
            Ok(a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (a, b) => Err(Error::TypeMismatch {
            expected: a.type_name(),
            actual: b.type_name(),
        }),
    }
}

fn arithmetic(lhs: &Value, op: BinaryOp, rhs: &Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => match op {
            BinaryOp::Add => Ok(Value::Int(a.wrapping_add(*b))),
            BinaryOp::Sub => Ok(Value::Int(a.wrapping_sub(*b))),
            BinaryOp::Mul => Ok(Value::Int(a.wrapping_mul(*b))),
            BinaryOp::Div => {
                if *b == 0 {
                    Err(Error::DivisionByZero)
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            _ => unreachable!("non-arithmetic op"),
        },
        _ => {
            let a = lhs.as_f64().ok_or(Error::TypeMismatch {
                expected: "number",
                actual: lhs.type_name(),
            })?;
            let b = rhs.as_f64().ok_or(Error::TypeMismatch {
                expected: "number",
                actual: rhs.type_name(),
            })?;
            match op {
                BinaryOp::Add => Ok(Value::Float(a + b)),
                BinaryOp::Sub => Ok(Value::Float(a - b)),
                BinaryOp::Mul => Ok(Value::Float(a * b)),
                BinaryOp::Div => {
                    if b == 0.0 {
                        Err(Error::DivisionByZero)
                    } else {
                        Ok(Value::Float(a / b))
                    }
                }
                _ => unreachable!("non-arithmetic op"),
            }
        }
    }
}

fn check_expected_type(value: &Value, expected: ValueType) -> Result<()> {
    let ok = match expected {
        ValueType::Any => true,
        ValueType::Bool => matches!(value, Value::Bool(_)),
        ValueType::Int => matches!(value, Value::Int(_)),
        ValueType::Float => matches!(value, Value::Float(_)),
        ValueType::String => matches!(value, Value::String(_)),
        ValueType::List => matches!(value, Value::List(_)),
        ValueType::Map => matches!(value, Value::Map(_)),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            expected: expected.name(),
            actual: value.type_name(),
        })
    }
}

fn expect_bool(value: Value) -> Result<bool> {
    value.as_bool().ok_or(Error::TypeMismatch {
        expected: "bool",
        actual: value.type_name(),
    })
}

fn evaluate_string(exp: &Exp, scope: &LoopScope) -> Result<String> {
    let value = evaluate(exp, scope)?;
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::TypeMismatch {
            expected: "string",
            actual: other.type_name(),
        }),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::String(s.clone()),
    }
}
