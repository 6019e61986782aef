//! List components: each calculation receives a whole branch as one list.
//!
//! Argument order always follows the declared inputs.

use crate::graph::PortDescriptor;
use crate::types::DataType;
use crate::value::{Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOp {
    Shift,
    CullIndex,
    CullPattern,
    CullNth,
    InsertItems,
    ListItem,
    Duplicate,
    ListLength,
}

static NULL: Value = Value::Null;

/// Largest list a Duplicate calculation may produce.
pub const MAX_DUPLICATE_LEN: usize = 1_000_000;

fn list_input(name: &'static str) -> PortDescriptor {
    PortDescriptor::input(name, DataType::Wild).list()
}

fn wrap_input() -> PortDescriptor {
    PortDescriptor::input("W", DataType::Boolean)
        .with_default(true)
        .describe("Wrap indices around the list length")
}

impl ListOp {
    pub fn inputs(&self) -> Vec<PortDescriptor> {
        let base = list_input("L").master().describe("List to operate on");
        match self {
            ListOp::Shift => vec![
                base,
                PortDescriptor::input("S", DataType::Number)
                    .with_default(1)
                    .describe("Offset"),
                wrap_input(),
            ],
            ListOp::CullIndex => vec![
                base,
                list_input("i").describe("Indices to remove"),
                wrap_input(),
            ],
            ListOp::CullPattern => vec![
                base,
                PortDescriptor::input("P", DataType::Boolean)
                    .list()
                    .describe("Repeating keep mask"),
            ],
            ListOp::CullNth => vec![
                base,
                PortDescriptor::input("N", DataType::Number)
                    .with_default(2)
                    .describe("Remove every Nth item"),
            ],
            ListOp::InsertItems => vec![
                base,
                list_input("I").describe("Items to insert"),
                PortDescriptor::input("i", DataType::Number)
                    .list()
                    .describe("Insertion indices"),
                wrap_input(),
            ],
            ListOp::ListItem => vec![
                list_input("L").describe("List to read from"),
                PortDescriptor::input("i", DataType::Number)
                    .with_default(0)
                    .describe("Item index"),
                wrap_input(),
            ],
            ListOp::Duplicate => vec![
                list_input("D").master().describe("Data to duplicate"),
                PortDescriptor::input("N", DataType::Number)
                    .with_default(2)
                    .describe("Number of copies"),
                PortDescriptor::input("O", DataType::Boolean)
                    .with_default(true)
                    .describe("Keep list order (otherwise repeat each item in place)"),
            ],
            ListOp::ListLength => vec![list_input("L").master()],
        }
    }

    pub fn outputs(&self) -> Vec<PortDescriptor> {
        match self {
            ListOp::ListItem => vec![PortDescriptor::output("i", DataType::Wild).rearranging()],
            ListOp::Duplicate => vec![PortDescriptor::output("D", DataType::Wild).rearranging()],
            ListOp::ListLength => vec![PortDescriptor::output("L", DataType::Number)],
            _ => vec![PortDescriptor::output("L", DataType::Wild).rearranging()],
        }
    }

    pub fn calculate(&self, args: &[Value]) -> std::result::Result<Record, String> {
        let arg = |i: usize| args.get(i).unwrap_or(&NULL);
        let (name, value): (&str, Value) = match self {
            ListOp::Shift => ("L", shift(list(arg(0)), number(arg(1))?, flag(arg(2))).into()),
            ListOp::CullIndex => (
                "L",
                cull_index(list(arg(0)), &indices(arg(1))?, flag(arg(2))).into(),
            ),
            ListOp::CullPattern => ("L", cull_pattern(list(arg(0)), list(arg(1))).into()),
            ListOp::CullNth => ("L", cull_nth(list(arg(0)), number(arg(1))?).into()),
            ListOp::InsertItems => (
                "L",
                insert_items(list(arg(0)), list(arg(1)), &indices(arg(2))?, flag(arg(3))).into(),
            ),
            ListOp::ListItem => ("i", list_item(list(arg(0)), number(arg(1))?, flag(arg(2)))),
            ListOp::Duplicate => (
                "D",
                duplicate(list(arg(0)), number(arg(1))?, flag(arg(2)))?.into(),
            ),
            ListOp::ListLength => ("L", Value::from(list(arg(0)).len())),
        };
        let mut record = Record::new();
        record.insert(name.to_string(), value);
        Ok(record)
    }
}

/// A list argument. A lone value counts as a one-item list.
fn list(value: &Value) -> &[Value] {
    match value {
        Value::List(items) => items,
        Value::Null => &[],
        other => std::slice::from_ref(other),
    }
}

fn number(value: &Value) -> std::result::Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("expected a number, got {}", value.type_name()))
}

fn flag(value: &Value) -> bool {
    value.is_truthy()
}

fn indices(value: &Value) -> std::result::Result<Vec<i64>, String> {
    list(value)
        .iter()
        .map(|v| number(v).map(|n| n.trunc() as i64))
        .collect()
}

/// Rotate (or with `wrap` off, drop) the first `offset` items.
pub fn shift(items: &[Value], offset: f64, wrap: bool) -> Vec<Value> {
    let n = items.len() as i64;
    let s = offset.trunc() as i64;
    let start = (if s < 0 { (n + s).max(0) } else { s.min(n) }) as usize;

    let mut out = items[start..].to_vec();
    if wrap {
        out.extend_from_slice(&items[..start]);
    }
    out
}

/// Remove the items at `remove`. With `wrap` indices are taken modulo the
/// length; otherwise indices outside the list are ignored.
pub fn cull_index(items: &[Value], remove: &[i64], wrap: bool) -> Vec<Value> {
    let n = items.len() as i64;
    if n == 0 {
        return Vec::new();
    }
    let mut culled = vec![false; items.len()];
    for &index in remove {
        let index = if wrap { index.rem_euclid(n) } else { index };
        if (0..n).contains(&index) {
            culled[index as usize] = true;
        }
    }
    items
        .iter()
        .zip(culled)
        .filter(|(_, c)| !c)
        .map(|(v, _)| v.clone())
        .collect()
}

/// Keep items whose position in the repeating mask is truthy.
pub fn cull_pattern(items: &[Value], pattern: &[Value]) -> Vec<Value> {
    if pattern.is_empty() {
        return Vec::new();
    }
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| pattern[i % pattern.len()].is_truthy())
        .map(|(_, v)| v.clone())
        .collect()
}

/// Drop every `n`th item (1-based). A zero `n` keeps everything.
pub fn cull_nth(items: &[Value], n: f64) -> Vec<Value> {
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| (*i as f64 + 1.0) % n != 0.0)
        .map(|(_, v)| v.clone())
        .collect()
}

/// Insert `inserts[k]` at `at[k]`, working from the last pair to the first.
///
/// Missing indices repeat the last one. With `wrap` an index is taken modulo
/// `len + 1`; otherwise negative indices count from the end and everything is
/// clamped into the list.
pub fn insert_items(items: &[Value], inserts: &[Value], at: &[i64], wrap: bool) -> Vec<Value> {
    let mut out = items.to_vec();
    let Some(&last_index) = at.last() else {
        return out;
    };
    for (k, item) in inserts.iter().enumerate().rev() {
        let index = at.get(k).copied().unwrap_or(last_index);
        let len = out.len() as i64;
        let position = if wrap {
            index.rem_euclid(len + 1)
        } else if index < 0 {
            (len + index).max(0)
        } else {
            index.min(len)
        };
        out.insert(position as usize, item.clone());
    }
    out
}

/// The item at `index`, or null when there is none.
pub fn list_item(items: &[Value], index: f64, wrap: bool) -> Value {
    let n = items.len() as i64;
    if n == 0 {
        return Value::Null;
    }
    let index = index.trunc() as i64;
    let index = if wrap { index.rem_euclid(n) } else { index };
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .unwrap_or(Value::Null)
}

/// `copies` repetitions of the list, whole (`keep_order`) or item by item.
///
/// Fails when the result would hold more than [`MAX_DUPLICATE_LEN`] items.
pub fn duplicate(
    items: &[Value],
    copies: f64,
    keep_order: bool,
) -> std::result::Result<Vec<Value>, String> {
    let copies = copies.max(0.0).trunc() as usize;
    let len = items
        .len()
        .checked_mul(copies)
        .filter(|len| *len <= MAX_DUPLICATE_LEN)
        .ok_or_else(|| {
            format!(
                "duplicating {} items {} times exceeds {} items",
                items.len(),
                copies,
                MAX_DUPLICATE_LEN
            )
        })?;
    if len == 0 {
        return Ok(Vec::new());
    }
    if keep_order {
        let mut out = Vec::with_capacity(len);
        for _ in 0..copies {
            out.extend_from_slice(items);
        }
        Ok(out)
    } else {
        Ok(items
            .iter()
            .flat_map(|v| std::iter::repeat(v.clone()).take(copies))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|&n| Value::from(n)).collect()
    }

    #[test]
    fn test_shift() {
        let items = nums(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(shift(&items, 1.0, true), nums(&[2.0, 3.0, 4.0, 1.0]));
        assert_eq!(shift(&items, 1.0, false), nums(&[2.0, 3.0, 4.0]));
        assert_eq!(shift(&items, -1.0, true), nums(&[4.0, 1.0, 2.0, 3.0]));
        assert_eq!(shift(&items, 10.0, false), Vec::<Value>::new());
        assert_eq!(shift(&[], 1.0, true), Vec::<Value>::new());
    }

    #[test]
    fn test_cull_index() {
        let items = nums(&[1.0, 2.0, 3.0]);
        assert_eq!(cull_index(&items, &[0, -1], true), nums(&[2.0]));
        assert_eq!(cull_index(&items, &[0, -1, 9], false), nums(&[2.0, 3.0]));
    }

    #[test]
    fn test_cull_pattern() {
        let items = nums(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mask = vec![Value::from(true), Value::from(false)];
        assert_eq!(cull_pattern(&items, &mask), nums(&[1.0, 3.0, 5.0]));
        assert!(cull_pattern(&items, &[]).is_empty());
    }

    #[test]
    fn test_cull_nth() {
        let items = nums(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(cull_nth(&items, 2.0), nums(&[1.0, 3.0, 5.0]));
        assert_eq!(cull_nth(&items, 0.0), items);
    }

    #[test]
    fn test_insert_items() {
        let items = nums(&[1.0, 2.0, 3.0]);
        let inserts = vec![Value::from("a"), Value::from("b")];
        assert_eq!(
            insert_items(&items, &inserts, &[1, 2], false),
            vec![
                Value::from(1.0),
                Value::from("a"),
                Value::from(2.0),
                Value::from("b"),
                Value::from(3.0)
            ]
        );
        // wrap: -1 lands at the end
        assert_eq!(
            insert_items(&items, &inserts[..1], &[-1], true).last(),
            Some(&Value::from("a"))
        );
        assert_eq!(insert_items(&items, &inserts, &[], true), items);
    }

    #[test]
    fn test_list_item() {
        let items = nums(&[1.0, 2.0, 3.0]);
        assert_eq!(list_item(&items, 4.0, true), Value::from(2.0));
        assert_eq!(list_item(&items, 4.0, false), Value::Null);
        assert_eq!(list_item(&items, -1.0, true), Value::from(3.0));
        assert_eq!(list_item(&[], 0.0, true), Value::Null);
    }

    #[test]
    fn test_duplicate() {
        let items = nums(&[1.0, 2.0]);
        assert_eq!(duplicate(&items, 2.0, true).unwrap(), nums(&[1.0, 2.0, 1.0, 2.0]));
        assert_eq!(duplicate(&items, 2.0, false).unwrap(), nums(&[1.0, 1.0, 2.0, 2.0]));
        assert!(duplicate(&[], 1e30, true).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_rejects_huge_counts() {
        let items = nums(&[1.0, 2.0]);
        assert!(duplicate(&items, 1e30, true).is_err());
        assert!(duplicate(&items, f64::INFINITY, false).is_err());
        assert!(duplicate(&items, (MAX_DUPLICATE_LEN + 1) as f64, true).is_err());

        // Reported as a row error rather than a panic
        let args = vec![Value::List(items), Value::from(1e30), Value::from(true)];
        let err = ListOp::Duplicate.calculate(&args).unwrap_err();
        assert!(err.contains("exceeds"));
    }

    #[test]
    fn test_calculate_reports_bad_numbers() {
        let args = vec![Value::List(nums(&[1.0])), Value::from("x"), Value::from(true)];
        assert!(ListOp::Shift.calculate(&args).is_err());

        let args = vec![Value::List(nums(&[1.0, 2.0]))];
        let record = ListOp::ListLength.calculate(&args).unwrap();
        assert_eq!(record["L"], Value::from(2.0));
    }
}
