//! Per-item calculation over differently shaped input trees.
//!
//! The matcher aligns every input of a component into rows, runs the
//! calculation once per aligned item and writes the results into one tree
//! per output.
//!
//! # Algorithm
//!
//! 1. **Master selection** - an input flagged `is_master` wins outright.
//!    Otherwise the deepest inputs compete; a lone ITEM input beats a lone
//!    LIST input, and remaining ties go to declaration order.
//! 2. **Enumeration** - each input's non-empty branches are listed in
//!    traversal order. LIST inputs contribute each branch as a single list
//!    value. Shorter enumerations repeat their last branch.
//! 3. **Destination paths** - each row lands on the master's branch path for
//!    that row. Once the master runs out (or a path repeats) the previous
//!    destination's last segment is incremented instead.
//! 4. **Calculation** - inside a row every value list is padded by repeating
//!    its last value and the calculation is called once per position.
//! 5. **Extraction** - each output pulls its key out of the result records.
//!
//! Calculations may be deferred. [`run`] never waits; it returns a
//! [`PendingMatch`] that finishes immediately when every calculation was
//! ready, or can be awaited with [`PendingMatch::resolve`].

mod calculation;

pub use calculation::{CalcFuture, Calculation, CalculationError};

use crate::tree::{DataTree, TreePath};
use crate::types::InterpretAs;
use crate::value::{Record, Value};

/// One input as seen by the matcher.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    pub tree: &'a DataTree,
    pub interpret_as: InterpretAs,
    pub is_master: bool,
}

impl<'a> MatchInput<'a> {
    pub fn new(tree: &'a DataTree, interpret_as: InterpretAs) -> Self {
        Self {
            tree,
            interpret_as,
            is_master: false,
        }
    }

    pub fn master(mut self) -> Self {
        self.is_master = true;
        self
    }
}

/// One output to be populated from the result records.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutput {
    pub short_name: String,
    pub interpret_as: InterpretAs,
}

impl MatchOutput {
    pub fn new(short_name: impl Into<String>, interpret_as: InterpretAs) -> Self {
        Self {
            short_name: short_name.into(),
            interpret_as,
        }
    }
}

/// Finished match: one tree per output, in output order.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub outputs: Vec<DataTree>,
    pub errors: Vec<CalculationError>,
    /// Number of calculation calls made.
    pub calls: usize,
}

impl MatchResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Tree for the output at `index`; empty when out of range.
    pub fn output(&self, index: usize) -> DataTree {
        self.outputs.get(index).cloned().unwrap_or_default()
    }
}

/// Pick the master input. `None` only when there are no inputs.
pub fn select_master(inputs: &[MatchInput<'_>]) -> Option<usize> {
    let flagged: Vec<usize> = (0..inputs.len()).filter(|&i| inputs[i].is_master).collect();
    if let [only] = flagged.as_slice() {
        return Some(*only);
    }

    let deepest = inputs.iter().map(|i| i.tree.max_path_depth()).max()?;
    let contenders: Vec<usize> = (0..inputs.len())
        .filter(|&i| inputs[i].tree.max_path_depth() == deepest)
        .collect();
    if let [only] = contenders.as_slice() {
        return Some(*only);
    }

    let tagged = |tag: InterpretAs| contenders.iter().copied().find(|&i| inputs[i].interpret_as == tag);
    tagged(InterpretAs::Item)
        .or_else(|| tagged(InterpretAs::List))
        .or_else(|| contenders.first().copied())
}

/// Branches of one input, as the matcher iterates them.
struct Enumeration {
    paths: Vec<TreePath>,
    values: Vec<Vec<Value>>,
}

impl Enumeration {
    fn of(input: &MatchInput<'_>) -> Self {
        let mut paths = Vec::new();
        let mut values = Vec::new();
        for (path, branch) in input.tree.branches() {
            paths.push(path);
            if input.interpret_as == InterpretAs::List {
                values.push(vec![Value::List(branch.to_vec())]);
            } else {
                values.push(branch.to_vec());
            }
        }
        Self { paths, values }
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    /// Values for `row`, repeating the last branch past the end.
    fn row(&self, row: usize) -> &[Value] {
        self.values
            .get(row)
            .or_else(|| self.values.last())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

struct PendingRow {
    path: TreePath,
    calculations: Vec<Calculation>,
}

/// Calculations issued for a match, waiting to be collected.
pub struct PendingMatch {
    rows: Vec<PendingRow>,
    outputs: Vec<MatchOutput>,
    master_is_list: bool,
}

impl std::fmt::Debug for PendingMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingMatch")
            .field("rows", &self.rows.len())
            .field("deferred", &self.is_deferred())
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// Align `inputs` into rows and call `calc` once per aligned item.
pub fn run(
    inputs: &[MatchInput<'_>],
    outputs: &[MatchOutput],
    mut calc: impl FnMut(&[Value]) -> Calculation,
) -> PendingMatch {
    let master = select_master(inputs);
    let master_is_list = master
        .map(|m| inputs[m].interpret_as == InterpretAs::List)
        .unwrap_or(false);

    let enumerations: Vec<Enumeration> = inputs.iter().map(Enumeration::of).collect();
    let row_count = enumerations.iter().map(Enumeration::len).max().unwrap_or(1);
    let master_paths: &[TreePath] = master
        .map(|m| enumerations[m].paths.as_slice())
        .unwrap_or(&[]);

    tracing::debug!(
        "Matching {} inputs into {} rows (master {:?}, list master: {})",
        inputs.len(),
        row_count,
        master,
        master_is_list
    );

    let mut rows = Vec::with_capacity(row_count);
    let mut prev = TreePath::default();
    let mut prev_used = false;
    for row in 0..row_count {
        let path = match master_paths.get(row) {
            Some(path) if !prev_used && *path != prev => path.clone(),
            _ => {
                prev_used = true;
                prev.incremented()
            }
        };
        prev = path.clone();

        let lists: Vec<&[Value]> = enumerations.iter().map(|e| e.row(row)).collect();
        let width = lists.iter().map(|l| l.len()).max().unwrap_or(0).max(1);
        let mut calculations = Vec::with_capacity(width);
        let mut args = Vec::with_capacity(lists.len());
        for index in 0..width {
            args.clear();
            args.extend(lists.iter().map(|list| {
                list.get(index)
                    .or_else(|| list.last())
                    .cloned()
                    .unwrap_or(Value::Null)
            }));
            calculations.push(calc(&args));
        }
        rows.push(PendingRow { path, calculations });
    }

    PendingMatch {
        rows,
        outputs: outputs.to_vec(),
        master_is_list,
    }
}

/// Run a match whose calculations are all immediate.
///
/// Deferred calculations, if any, are reported as row errors.
pub fn run_ready(
    inputs: &[MatchInput<'_>],
    outputs: &[MatchOutput],
    calc: impl FnMut(&[Value]) -> Calculation,
) -> MatchResult {
    match run(inputs, outputs, calc).try_finish() {
        Ok(result) => result,
        Err(pending) => pending.finish_with(|c| match c {
            Calculation::Ready(result) => result,
            Calculation::Deferred(_) => Err("calculation was deferred".to_string()),
        }),
    }
}

impl PendingMatch {
    /// True when at least one calculation has to be awaited.
    pub fn is_deferred(&self) -> bool {
        self.rows
            .iter()
            .any(|r| r.calculations.iter().any(Calculation::is_deferred))
    }

    /// Finish without waiting, or hand the match back if something is deferred.
    pub fn try_finish(self) -> std::result::Result<MatchResult, PendingMatch> {
        if self.is_deferred() {
            return Err(self);
        }
        Ok(self.finish_with(|c| match c {
            Calculation::Ready(result) => result,
            Calculation::Deferred(_) => Err("calculation was deferred".to_string()),
        }))
    }

    /// Await every deferred calculation, in row order, and finish.
    pub async fn resolve(self) -> MatchResult {
        let PendingMatch {
            rows,
            outputs,
            master_is_list,
        } = self;
        let mut resolved = Vec::with_capacity(rows.len());
        for row in rows {
            let mut results = Vec::with_capacity(row.calculations.len());
            for calculation in row.calculations {
                results.push(calculation.resolve().await);
            }
            resolved.push((row.path, results));
        }
        assemble(resolved, &outputs, master_is_list)
    }

    fn finish_with(
        self,
        mut collect: impl FnMut(Calculation) -> std::result::Result<Record, String>,
    ) -> MatchResult {
        let resolved = self
            .rows
            .into_iter()
            .map(|row| {
                let results = row.calculations.into_iter().map(&mut collect).collect();
                (row.path, results)
            })
            .collect();
        assemble(resolved, &self.outputs, self.master_is_list)
    }
}

type ResolvedRow = (TreePath, Vec<std::result::Result<Record, String>>);

fn assemble(rows: Vec<ResolvedRow>, outputs: &[MatchOutput], master_is_list: bool) -> MatchResult {
    let mut combined = DataTree::new();
    let mut errors = Vec::new();
    let mut calls = 0;

    for (row, (path, results)) in rows.into_iter().enumerate() {
        calls += results.len();
        let records: std::result::Result<Vec<Value>, String> =
            results.into_iter().map(|r| r.map(Value::Record)).collect();
        match records {
            Ok(records) => {
                if let Err(e) = combined.append_at_path(records, &path) {
                    errors.push(CalculationError {
                        row,
                        path,
                        message: e.to_string(),
                    });
                }
            }
            Err(message) => {
                tracing::debug!("Calculation failed in row {} at {}: {}", row, path, message);
                errors.push(CalculationError { row, path, message });
            }
        }
    }

    let outputs = outputs
        .iter()
        .map(|output| extract(&combined, output, master_is_list))
        .collect();

    MatchResult {
        outputs,
        errors,
        calls,
    }
}

fn extract(combined: &DataTree, output: &MatchOutput, master_is_list: bool) -> DataTree {
    let field = |record: &Value| {
        record
            .as_record()
            .and_then(|r| r.get(&output.short_name))
            .cloned()
            .unwrap_or(Value::Null)
    };

    if !master_is_list || output.interpret_as == InterpretAs::List {
        return combined.map(field);
    }

    // A list master produced one result per branch: unwrap it into the branch
    let mut tree = DataTree::new();
    for (path, records) in combined.branches() {
        let mut values = Vec::new();
        for record in records {
            match field(record) {
                Value::List(items) => values.extend(items),
                other => values.push(other),
            }
        }
        if let Err(e) = tree.set_data_at_path(values, &path) {
            tracing::warn!("Dropping output branch {}: {}", path, e);
        }
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|&n| Value::from(n)).collect()
    }

    fn sum(args: &[Value]) -> Calculation {
        let total: f64 = args.iter().filter_map(Value::as_f64).sum();
        Calculation::single("R", total)
    }

    fn traversal(tree: &DataTree) -> Vec<(String, Vec<Value>)> {
        tree.branches().map(|(p, v)| (p.key(), v.to_vec())).collect()
    }

    #[test]
    fn test_master_prefers_deepest_item() {
        let shallow = DataTree::from_values(nums(&[1.0]));
        let mut deep = DataTree::new();
        deep.set_data_at_path(nums(&[1.0]), &[0, 0]).unwrap();

        let inputs = [
            MatchInput::new(&shallow, InterpretAs::Item),
            MatchInput::new(&shallow, InterpretAs::List),
            MatchInput::new(&deep, InterpretAs::Item),
        ];
        assert_eq!(select_master(&inputs), Some(2));
    }

    #[test]
    fn test_master_flag_wins() {
        let shallow = DataTree::from_values(nums(&[1.0]));
        let mut deep = DataTree::new();
        deep.set_data_at_path(nums(&[1.0]), &[0, 0]).unwrap();

        let inputs = [
            MatchInput::new(&shallow, InterpretAs::List).master(),
            MatchInput::new(&deep, InterpretAs::Item),
        ];
        assert_eq!(select_master(&inputs), Some(0));
    }

    #[test]
    fn test_master_ties_fall_back_to_order() {
        let tree = DataTree::from_values(nums(&[1.0]));
        let lists = [
            MatchInput::new(&tree, InterpretAs::List),
            MatchInput::new(&tree, InterpretAs::List),
        ];
        assert_eq!(select_master(&lists), Some(0));

        let mixed = [
            MatchInput::new(&tree, InterpretAs::List),
            MatchInput::new(&tree, InterpretAs::Item),
            MatchInput::new(&tree, InterpretAs::Item),
        ];
        assert_eq!(select_master(&mixed), Some(1));
        assert_eq!(select_master(&[]), None);
    }

    #[test]
    fn test_single_item_repeats_across_list() {
        let a = DataTree::from_values(nums(&[1.0, 2.0, 3.0]));
        let b = DataTree::from_values(nums(&[10.0]));
        let inputs = [
            MatchInput::new(&a, InterpretAs::Item),
            MatchInput::new(&b, InterpretAs::Item),
        ];
        let result = run_ready(&inputs, &[MatchOutput::new("R", InterpretAs::Item)], sum);

        assert!(!result.has_errors());
        assert_eq!(result.calls, 3);
        assert_eq!(
            traversal(&result.output(0)),
            vec![("0".to_string(), nums(&[11.0, 12.0, 13.0]))]
        );
    }

    #[test]
    fn test_rows_follow_master_paths_then_increment() {
        let mut master = DataTree::new();
        master.set_data_at_path(nums(&[1.0]), &[0, 3]).unwrap();
        let mut other = DataTree::new();
        other.set_data_at_path(nums(&[1.0]), &[0]).unwrap();
        other.set_data_at_path(nums(&[2.0]), &[1]).unwrap();
        other.set_data_at_path(nums(&[3.0]), &[2]).unwrap();

        let inputs = [
            MatchInput::new(&master, InterpretAs::Item),
            MatchInput::new(&other, InterpretAs::Item),
        ];
        let result = run_ready(&inputs, &[MatchOutput::new("R", InterpretAs::Item)], sum);
        assert_eq!(
            traversal(&result.output(0)),
            vec![
                ("0;3".to_string(), nums(&[2.0])),
                ("0;4".to_string(), nums(&[3.0])),
                ("0;5".to_string(), nums(&[4.0])),
            ]
        );
    }

    #[test]
    fn test_list_input_sees_whole_branch() {
        let list = DataTree::from_values(nums(&[1.0, 2.0, 3.0]));
        let inputs = [MatchInput::new(&list, InterpretAs::List).master()];
        let outputs = [MatchOutput::new("L", InterpretAs::Item)];
        let result = run_ready(&inputs, &outputs, |args| {
            let items = args[0].as_list().unwrap_or_default().to_vec();
            let reversed: Vec<Value> = items.into_iter().rev().collect();
            Calculation::single("L", reversed)
        });

        assert_eq!(result.calls, 1);
        // unwrapped into the branch, not fanned out
        assert_eq!(
            traversal(&result.output(0)),
            vec![("0".to_string(), nums(&[3.0, 2.0, 1.0]))]
        );
    }

    #[test]
    fn test_unflagged_list_master_also_unwraps() {
        let list = DataTree::from_values(nums(&[1.0, 2.0, 3.0]));
        let inputs = [MatchInput::new(&list, InterpretAs::List)];
        let result = run_ready(&inputs, &[MatchOutput::new("L", InterpretAs::Item)], |args| {
            let items = args[0].as_list().unwrap_or_default().to_vec();
            Calculation::single("L", items.into_iter().rev().collect::<Vec<_>>())
        });

        assert_eq!(
            traversal(&result.output(0)),
            vec![("0".to_string(), nums(&[3.0, 2.0, 1.0]))]
        );
    }

    #[test]
    fn test_list_results_fan_out_for_item_master() {
        let counts = DataTree::from_values(nums(&[2.0]));
        let inputs = [MatchInput::new(&counts, InterpretAs::Item)];
        let result = run_ready(&inputs, &[MatchOutput::new("S", InterpretAs::List)], |args| {
            let n = args[0].as_f64().unwrap_or_default() as usize;
            Calculation::single("S", (0..n).map(Value::from).collect::<Vec<_>>())
        });
        assert_eq!(
            traversal(&result.output(0)),
            vec![("0;0".to_string(), nums(&[0.0, 1.0]))]
        );
    }

    #[test]
    fn test_row_error_is_recorded_and_other_rows_continue() {
        let mut tree = DataTree::new();
        tree.set_data_at_path(nums(&[1.0]), &[0]).unwrap();
        tree.set_data_at_path(nums(&[-1.0]), &[1]).unwrap();

        let inputs = [MatchInput::new(&tree, InterpretAs::Item)];
        let result = run_ready(&inputs, &[MatchOutput::new("R", InterpretAs::Item)], |args| {
            match args[0].as_f64() {
                Some(n) if n < 0.0 => Calculation::err("negative"),
                Some(n) => Calculation::single("R", n.sqrt()),
                None => Calculation::err("not a number"),
            }
        });

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row, 1);
        assert_eq!(result.errors[0].path, TreePath::from(vec![1]));
        assert_eq!(traversal(&result.output(0)), vec![("0".to_string(), nums(&[1.0]))]);
    }

    #[test]
    fn test_missing_output_key_is_null() {
        let tree = DataTree::from_values(nums(&[1.0]));
        let inputs = [MatchInput::new(&tree, InterpretAs::Item)];
        let outputs = [MatchOutput::new("R", InterpretAs::Item), MatchOutput::new("Q", InterpretAs::Item)];
        let result = run_ready(&inputs, &outputs, sum);
        assert_eq!(result.output(1).data_at_path(&[0]), &[Value::Null]);
    }

    #[test]
    fn test_no_inputs_runs_once() {
        let result = run_ready(&[], &[MatchOutput::new("R", InterpretAs::Item)], |_| {
            Calculation::single("R", 7)
        });
        assert_eq!(traversal(&result.output(0)), vec![("0".to_string(), nums(&[7.0]))]);
    }

    #[tokio::test]
    async fn test_deferred_calculations_resolve_in_order() {
        let tree = DataTree::from_values(nums(&[1.0, 2.0]));
        let inputs = [MatchInput::new(&tree, InterpretAs::Item)];
        let pending = run(&inputs, &[MatchOutput::new("R", InterpretAs::Item)], |args| {
            let n = args[0].as_f64().unwrap_or_default();
            Calculation::deferred(async move {
                tokio::task::yield_now().await;
                let mut record = Record::new();
                record.insert("R".to_string(), Value::from(n * 100.0));
                Ok(record)
            })
        });

        let pending = pending.try_finish().unwrap_err();
        let result = pending.resolve().await;
        assert_eq!(
            traversal(&result.output(0)),
            vec![("0".to_string(), nums(&[100.0, 200.0]))]
        );
    }
}
