//! Path execution
//!
//! Walks a context chain over a bin value and either collects matches
//! (SELECT) or rewrites them (MODIFY). Enumeration steps bind the loop
//! variable for the filter at that depth; nested filters each see their own
//! element.
//!
//! With `no_fail` set, malformed-data errors raised while testing an element
//! demote that element to a non-match instead of failing the whole query.
//! Other errors, an invalid regex for instance, always propagate.

use std::collections::BTreeMap;

use pathql::{Exp, PathStep, SelectMode, Selection};

use crate::error::{Error, Result};
use crate::query::filter::{self, LoopScope};
use crate::storage::record::Value;
use crate::QueryResult;

/// Run a SELECT over a bin value
pub fn select(value: &Value, steps: &[PathStep], selection: Selection) -> Result<QueryResult> {
    match selection.mode {
        SelectMode::Tree => {
            let pruned = prune(value, steps, selection.no_fail)?;
            Ok(QueryResult::Tree(pruned.unwrap_or_else(|| empty_like(value))))
        }
        SelectMode::Values => {
            let mut out = Vec::new();
            collect(value, steps, selection.no_fail, None, &mut out)?;
            Ok(QueryResult::Values(out.into_iter().map(|(_, v)| v).collect()))
        }
        SelectMode::Keys => {
            let mut out = Vec::new();
            collect(value, steps, selection.no_fail, None, &mut out)?;
            Ok(QueryResult::Keys(
                out.into_iter()
                    .map(|(k, _)| k.unwrap_or(Value::Null))
                    .collect(),
            ))
        }
        SelectMode::Count => {
            let mut out = Vec::new();
            collect(value, steps, selection.no_fail, None, &mut out)?;
            Ok(QueryResult::Count(out.len()))
        }
    }
}

/// Run a MODIFY over a bin value.
///
/// At every node the chain matches, sets `set_key` to the result of
/// evaluating `exp` with the node bound as the loop variable. Returns the
/// rewritten value and the number of nodes changed.
pub fn modify(
    value: &Value,
    steps: &[PathStep],
    set_key: &str,
    exp: &Exp,
    no_fail: bool,
) -> Result<(Value, usize)> {
    rewrite(value, steps, set_key, exp, no_fail, LoopScope::root(value))
}

/// Insert a key into a map reached by a chain of Key/Index steps.
///
/// Enumeration steps are not allowed here; an insertion targets exactly one
/// map. Used to plant records at a known position without rewriting the
/// whole bin.
pub fn insert_at(value: &Value, steps: &[PathStep], key: &str, new: Value) -> Result<Value> {
    match steps.first() {
        None => match value {
            Value::Map(entries) => {
                let mut entries = entries.clone();
                entries.insert(key.to_string(), new);
                Ok(Value::Map(entries))
            }
            other => Err(Error::TypeMismatch {
                expected: "map",
                actual: other.type_name(),
            }),
        },
        Some(PathStep::Key(step_key)) => {
            let entries = value.as_map().ok_or(Error::TypeMismatch {
                expected: "map",
                actual: value.type_name(),
            })?;
            let child = entries.get(step_key).ok_or_else(|| Error::PathUnresolved {
                step: step_key.clone(),
            })?;
            let rewritten = insert_at(child, &steps[1..], key, new)?;
            let mut entries = entries.clone();
            entries.insert(step_key.clone(), rewritten);
            Ok(Value::Map(entries))
        }
        Some(PathStep::Index(i)) => {
            let items = value.as_list().ok_or(Error::TypeMismatch {
                expected: "list",
                actual: value.type_name(),
            })?;
            let index = resolve_index(*i, items.len()).ok_or_else(|| Error::PathUnresolved {
                step: format!("[{i}]"),
            })?;
            let rewritten = insert_at(&items[index], &steps[1..], key, new)?;
            let mut items = items.clone();
            items[index] = rewritten;
            Ok(Value::List(items))
        }
        Some(PathStep::AllChildren) | Some(PathStep::Filtered(_)) => Err(Error::QueryError {
            message: "insertion paths must name keys or indexes".to_string(),
        }),
    }
}

/// Tree-mode walk: keep only the ancestor structure leading to matches.
///
/// Returns None when nothing below this node matches, so empty branches
/// disappear from the result instead of showing up as empty maps.
fn prune(value: &Value, steps: &[PathStep], no_fail: bool) -> Result<Option<Value>> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(Some(value.clone()));
    };

    match step {
        PathStep::Key(key) => {
            let Some(entries) = value.as_map() else {
                return tolerate_shape(no_fail, "map", value);
            };
            let Some(child) = entries.get(key) else {
                return Ok(None);
            };
            Ok(prune(child, rest, no_fail)?.map(|sub| {
                let mut kept = BTreeMap::new();
                kept.insert(key.clone(), sub);
                Value::Map(kept)
            }))
        }

        PathStep::Index(i) => {
            let Some(items) = value.as_list() else {
                return tolerate_shape(no_fail, "list", value);
            };
            let Some(index) = resolve_index(*i, items.len()) else {
                return Ok(None);
            };
            Ok(prune(&items[index], rest, no_fail)?
                .map(|sub| Value::List(vec![sub])))
        }

        PathStep::AllChildren | PathStep::Filtered(_) => {
            let predicate = match step {
                PathStep::Filtered(exp) => Some(exp),
                _ => None,
            };
            match value {
                Value::Map(entries) => {
                    let mut kept = BTreeMap::new();
                    for (key, child) in entries {
                        let scope = LoopScope::map_entry(key, child);
                        if !element_matches(predicate, &scope, no_fail)? {
                            continue;
                        }
                        if let Some(sub) = prune(child, rest, no_fail)? {
                            kept.insert(key.clone(), sub);
                        }
                    }
                    Ok((!kept.is_empty()).then_some(Value::Map(kept)))
                }
                Value::List(items) => {
                    let mut kept = Vec::new();
                    for (index, child) in items.iter().enumerate() {
                        let scope = LoopScope::list_entry(index, child);
                        if !element_matches(predicate, &scope, no_fail)? {
                            continue;
                        }
                        if let Some(sub) = prune(child, rest, no_fail)? {
                            kept.push(sub);
                        }
                    }
                    Ok((!kept.is_empty()).then_some(Value::List(kept)))
                }
                other => tolerate_shape(no_fail, "map or list", other),
            }
        }
    }
}

/// Flattening walk for Values, Keys, and Count modes.
///
/// `binding` is the matched node's position in its parent, carried so Keys
/// mode can report it. A match at the path root has no binding.
fn collect(
    value: &Value,
    steps: &[PathStep],
    no_fail: bool,
    binding: Option<Value>,
    out: &mut Vec<(Option<Value>, Value)>,
) -> Result<()> {
    let Some((step, rest)) = steps.split_first() else {
        out.push((binding, value.clone()));
        return Ok(());
    };

    match step {
        PathStep::Key(key) => {
            let Some(entries) = value.as_map() else {
                tolerate_shape(no_fail, "map", value)?;
                return Ok(());
            };
            if let Some(child) = entries.get(key) {
                collect(child, rest, no_fail, Some(Value::String(key.clone())), out)?;
            }
            Ok(())
        }

        PathStep::Index(i) => {
            let Some(items) = value.as_list() else {
                tolerate_shape(no_fail, "list", value)?;
                return Ok(());
            };
            if let Some(index) = resolve_index(*i, items.len()) {
                collect(&items[index], rest, no_fail, Some(Value::Int(index as i64)), out)?;
            }
            Ok(())
        }

        PathStep::AllChildren | PathStep::Filtered(_) => {
            let predicate = match step {
                PathStep::Filtered(exp) => Some(exp),
                _ => None,
            };
            match value {
                Value::Map(entries) => {
                    for (key, child) in entries {
                        let scope = LoopScope::map_entry(key, child);
                        if element_matches(predicate, &scope, no_fail)? {
                            collect(child, rest, no_fail, Some(Value::String(key.clone())), out)?;
                        }
                    }
                    Ok(())
                }
                Value::List(items) => {
                    for (index, child) in items.iter().enumerate() {
                        let scope = LoopScope::list_entry(index, child);
                        if element_matches(predicate, &scope, no_fail)? {
                            collect(child, rest, no_fail, Some(Value::Int(index as i64)), out)?;
                        }
                    }
                    Ok(())
                }
                other => {
                    tolerate_shape(no_fail, "map or list", other)?;
                    Ok(())
                }
            }
        }
    }
}

/// MODIFY walk: rebuild the value with every matched node rewritten
fn rewrite(
    value: &Value,
    steps: &[PathStep],
    set_key: &str,
    exp: &Exp,
    no_fail: bool,
    scope: LoopScope,
) -> Result<(Value, usize)> {
    let Some((step, rest)) = steps.split_first() else {
        return apply_set(value, set_key, exp, no_fail, scope);
    };

    match step {
        PathStep::Key(key) => {
            let Some(entries) = value.as_map() else {
                tolerate_shape(no_fail, "map", value)?;
                return Ok((value.clone(), 0));
            };
            let Some(child) = entries.get(key) else {
                return Ok((value.clone(), 0));
            };
            let child_scope = LoopScope::map_entry(key, child);
            let (rewritten, changed) = rewrite(child, rest, set_key, exp, no_fail, child_scope)?;
            let mut entries = entries.clone();
            entries.insert(key.clone(), rewritten);
            Ok((Value::Map(entries), changed))
        }

        PathStep::Index(i) => {
            let Some(items) = value.as_list() else {
                tolerate_shape(no_fail, "list", value)?;
                return Ok((value.clone(), 0));
            };
            let Some(index) = resolve_index(*i, items.len()) else {
                return Ok((value.clone(), 0));
            };
            let child_scope = LoopScope::list_entry(index, &items[index]);
            let (rewritten, changed) =
                rewrite(&items[index], rest, set_key, exp, no_fail, child_scope)?;
            let mut items = items.clone();
            items[index] = rewritten;
            Ok((Value::List(items), changed))
        }

        PathStep::AllChildren | PathStep::Filtered(_) => {
            let predicate = match step {
                PathStep::Filtered(exp) => Some(exp),
                _ => None,
            };
            match value {
                Value::Map(entries) => {
                    let mut rebuilt = BTreeMap::new();
                    let mut changed = 0;
                    for (key, child) in entries {
                        let child_scope = LoopScope::map_entry(key, child);
                        if element_matches(predicate, &child_scope, no_fail)? {
                            let (rewritten, n) =
                                rewrite(child, rest, set_key, exp, no_fail, child_scope)?;
                            rebuilt.insert(key.clone(), rewritten);
                            changed += n;
                        } else {
                            rebuilt.insert(key.clone(), child.clone());
                        }
                    }
                    Ok((Value::Map(rebuilt), changed))
                }
                Value::List(items) => {
                    let mut rebuilt = Vec::with_capacity(items.len());
                    let mut changed = 0;
                    for (index, child) in items.iter().enumerate() {
                        let child_scope = LoopScope::list_entry(index, child);
                        if element_matches(predicate, &child_scope, no_fail)? {
                            let (rewritten, n) =
                                rewrite(child, rest, set_key, exp, no_fail, child_scope)?;
                            rebuilt.push(rewritten);
                            changed += n;
                        } else {
                            rebuilt.push(child.clone());
                        }
                    }
                    Ok((Value::List(rebuilt), changed))
                }
                other => {
                    tolerate_shape(no_fail, "map or list", other)?;
                    Ok((value.clone(), 0))
                }
            }
        }
    }
}

/// Apply a SET clause to one matched node
fn apply_set(
    value: &Value,
    set_key: &str,
    exp: &Exp,
    no_fail: bool,
    scope: LoopScope,
) -> Result<(Value, usize)> {
    let entries = match value.as_map() {
        Some(entries) => entries,
        None => {
            tolerate_shape(no_fail, "map", value)?;
            return Ok((value.clone(), 0));
        }
    };
    let new_value = match filter::evaluate(exp, &scope) {
        Ok(v) => v,
        Err(e) if no_fail && e.is_malformed_data() => return Ok((value.clone(), 0)),
        Err(e) => return Err(e),
    };
    let mut entries = entries.clone();
    entries.insert(set_key.to_string(), new_value);
    Ok((Value::Map(entries), 1))
}

/// Test a filter predicate over one element, honoring no_fail
fn element_matches(predicate: Option<&Exp>, scope: &LoopScope, no_fail: bool) -> Result<bool> {
    let Some(exp) = predicate else {
        return Ok(true);
    };
    match filter::matches(exp, scope) {
        Ok(matched) => Ok(matched),
        Err(e) if no_fail && e.is_malformed_data() => Ok(false),
        Err(e) => Err(e),
    }
}

/// A wrong-shaped node is a malformed-data error, which no_fail demotes to
/// "no match here"
fn tolerate_shape(no_fail: bool, expected: &'static str, actual: &Value) -> Result<Option<Value>> {
    if no_fail {
        Ok(None)
    } else {
        Err(Error::TypeMismatch {
            expected,
            actual: actual.type_name(),
        })
    }
}

fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let index = if i < 0 { i + len as i64 } else { i };
    if index >= 0 && (index as usize) < len {
        Some(index as usize)
    } else {
        None
    }
}

fn empty_like(value: &Value) -> Value {
    match value {
        Value::Map(_) => Value::Map(BTreeMap::new()),
        Value::List(_) => Value::List(Vec::new()),
        _ => Value::Null,
    }
}
