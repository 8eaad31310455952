#![allow(missing_docs)]

use blockflow::env::Severity;
use blockflow::ops::join;
use blockflow::program::Block;
use blockflow::table::{row, INDEX_COLUMN};
use blockflow::{
    BlockTree, Catalog, Environment, RecordingSink, Result, Row, RunOptions, RunReport, Runner,
    Table, Value,
};
use proptest::prelude::*;

fn compare(op: &str, a: Block, b: Block) -> Block {
    Block::new("variable_compare")
        .field("OP", op)
        .field("A", a)
        .field("B", b)
}

fn filter(predicate: Block) -> Block {
    Block::new("dplyr_filter").field("Column", predicate)
}

fn aggregate(func: &str, column: &str) -> Block {
    Block::new(format!("stats_{func}")).field("Column", Block::column(column))
}

struct Outcome {
    result: Result<RunReport>,
    sink: RecordingSink,
    log: blockflow::env::DiagnosticLog,
}

fn run_stacks(stacks: Vec<Vec<Block>>) -> Outcome {
    run_with(&Catalog::with_builtins().expect("builtins"), stacks)
}

fn run_with(catalog: &Catalog, stacks: Vec<Vec<Block>>) -> Outcome {
    let tree = BlockTree::from_stacks(stacks);
    let mut sink = RecordingSink::new();
    let (result, log) = {
        let mut env = Environment::new(catalog, &mut sink);
        let result = Runner::new(RunOptions::default()).run_tree(&tree, &mut env);
        (result, env.into_log())
    };
    Outcome { result, sink, log }
}

fn final_table(outcome: &Outcome) -> &[Row] {
    outcome.sink.last_table().expect("a displayed table")
}

#[test]
fn filter_on_nonzero_red() {
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        filter(compare("NEQ", Block::column("red"), Block::number(0))),
    ]]);
    outcome.result.as_ref().expect("run succeeds");
    let rows = final_table(&outcome);
    assert_eq!(rows.len(), 5);
    let names: Vec<_> = rows.iter().map(|r| r["name"].to_string()).collect();
    assert_eq!(names, ["red", "fuchsia", "maroon", "yellow", "white"]);
}

#[test]
fn filter_comparing_two_columns() {
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        filter(compare("GTE", Block::column("red"), Block::column("green"))),
    ]]);
    outcome.result.as_ref().expect("run succeeds");
    assert_eq!(final_table(&outcome).len(), 8);
}

#[test]
fn summarize_sum_of_whole_table() {
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        Block::new("dplyr_summarize").field("Column", aggregate("sum", "red")),
    ]]);
    outcome.result.as_ref().expect("run succeeds");
    assert_eq!(final_table(&outcome), [row([("red", 1148i64)])]);
}

#[test]
fn group_then_count_in_first_encounter_order() {
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        Block::new("dplyr_groupby").field("Column", Block::column("blue")),
        Block::new("dplyr_summarize").field("Column", aggregate("count", "red")),
    ]]);
    outcome.result.as_ref().expect("run succeeds");
    assert_eq!(
        final_table(&outcome),
        [
            row([(INDEX_COLUMN, 0i64), ("red", 6)]),
            row([(INDEX_COLUMN, 255i64), ("red", 4)]),
            row([(INDEX_COLUMN, 128i64), ("red", 1)]),
        ]
    );
}

#[test]
fn group_then_mean() {
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        Block::new("dplyr_groupby").field("Column", Block::column("blue")),
        Block::new("dplyr_summarize").field("Column", aggregate("mean", "green")),
    ]]);
    outcome.result.as_ref().expect("run succeeds");
    assert_eq!(
        final_table(&outcome),
        [
            row([(INDEX_COLUMN, Value::Int(0)), ("green", Value::Float(638.0 / 6.0))]),
            row([(INDEX_COLUMN, Value::Int(255)), ("green", Value::Float(127.5))]),
            row([(INDEX_COLUMN, Value::Int(128)), ("green", Value::Float(0.0))]),
        ]
    );
}

#[test]
fn grouped_table_without_summarize_keeps_blocks_contiguous() {
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        Block::new("dplyr_groupby").field("Column", Block::column("blue")),
    ]]);
    outcome.result.as_ref().expect("run succeeds");
    let keys: Vec<_> = final_table(&outcome)
        .iter()
        .map(|r| r[INDEX_COLUMN].clone())
        .collect();
    let expected: Vec<Value> = [0, 0, 0, 0, 0, 0, 255, 255, 255, 255, 128]
        .into_iter()
        .map(Value::Int)
        .collect();
    assert_eq!(keys, expected);
    assert!(final_table(&outcome).iter().all(|r| !r.contains_key("blue")));
}

#[test]
fn mutate_adds_a_computed_column() {
    let sum = Block::new("stats_arithmetic")
        .field("OP", "ADD")
        .field("A", Block::column("red"))
        .field("B", Block::column("green"));
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        Block::new("dplyr_mutate")
            .field("newCol", "rg")
            .field("Column", sum),
    ]]);
    outcome.result.as_ref().expect("run succeeds");
    let rows = final_table(&outcome);
    assert_eq!(rows.len(), 11);
    let yellow = rows.iter().find(|r| r["name"] == Value::from("yellow")).unwrap();
    assert_eq!(yellow["rg"], Value::Int(510));
}

#[test]
fn select_keeps_only_named_columns() {
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        Block::new("dplyr_select").field(
            "Column",
            vec![Block::column("name"), Block::column("red")],
        ),
    ]]);
    outcome.result.as_ref().expect("run succeeds");
    let rows = final_table(&outcome);
    assert_eq!(rows.len(), 11);
    assert!(rows.iter().all(|r| r.len() == 2 && r.contains_key("name")));
}

#[test]
fn select_of_unknown_column_fails() {
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        Block::new("dplyr_select").field("Column", Block::column("purple")),
    ]]);
    let err = outcome.result.expect_err("unknown column");
    assert_eq!(err.code(), "UnknownColumn");
    assert_eq!(outcome.log.with_severity(Severity::Error).count(), 1);
}

#[test]
fn histogram_sends_table_and_plot() {
    let outcome = run_stacks(vec![vec![
        Block::new("data_colors"),
        Block::new("ggplot_hist")
            .field("Column", Block::column("red"))
            .field("bins", Block::number(5)),
    ]]);
    outcome.result.as_ref().expect("run succeeds");
    assert_eq!(outcome.sink.tables.len(), 1);
    let colors = Catalog::with_builtins().unwrap().get("colors").unwrap().clone();
    assert_eq!(final_table(&outcome), colors.rows());
    let spec = outcome.sink.last_plot().expect("a plot");
    assert_eq!(spec["data"]["values"], colors.to_json());
    assert_eq!(spec["encoding"]["x"]["bin"]["maxbins"], 5);
    assert_eq!(spec["encoding"]["x"]["bin"]["step"], 51.0);
}

#[test]
fn stray_stacks_are_reported_and_skipped() {
    let outcome = run_stacks(vec![
        vec![filter(compare("NEQ", Block::column("red"), Block::number(0)))],
        vec![Block::new("data_single")],
    ]);
    let report = outcome.result.as_ref().expect("run succeeds");
    assert_eq!(report.stray_count, 1);
    assert_eq!(report.pipelines_run, 1);
    let warnings: Vec<_> = outcome
        .log
        .with_severity(Severity::Warn)
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(warnings, ["1 stray stacks found"]);
}

#[test]
fn unknown_dataset_fails_the_run() {
    let outcome = run_stacks(vec![vec![Block::new("data_nothing")]]);
    assert_eq!(outcome.result.unwrap_err().code(), "UnknownDataset");
    assert!(outcome.sink.tables.is_empty());
}

#[test]
fn compile_error_runs_nothing() {
    let outcome = run_stacks(vec![
        vec![Block::new("data_single")],
        vec![
            Block::new("data_colors"),
            filter(
                Block::new("variable_compare")
                    .with_id("broken")
                    .field("OP", "GT")
                    .field("A", Block::column("red")),
            ),
        ],
    ]);
    assert_eq!(outcome.result.unwrap_err().code(), "CompileError");
    assert!(outcome.sink.tables.is_empty());
}

fn numbers_table(values: &[i64]) -> Table {
    let rows = values
        .iter()
        .enumerate()
        .map(|(idx, v)| row([("id", idx as i64), ("v", *v), ("k", v.rem_euclid(3))]))
        .collect();
    Table::from_rows(rows).unwrap()
}

fn numbers_catalog(values: &[i64]) -> Catalog {
    let mut catalog = Catalog::new();
    catalog.insert("numbers", numbers_table(values));
    catalog
}

proptest! {
    #[test]
    fn filter_keeps_an_ordered_subset(
        values in prop::collection::vec(-50i64..50, 0..40),
        cut in -50i64..50,
    ) {
        let catalog = numbers_catalog(&values);
        let outcome = run_with(&catalog, vec![vec![
            Block::new("data_numbers"),
            filter(compare("GT", Block::column("v"), Block::number(cut))),
        ]]);
        prop_assert!(outcome.result.is_ok());
        let rows = final_table(&outcome);
        let expected: Vec<i64> = values.iter().copied().filter(|v| *v > cut).collect();
        let got: Vec<i64> = rows
            .iter()
            .map(|r| match r["v"] { Value::Int(v) => v, _ => unreachable!() })
            .collect();
        prop_assert_eq!(got, expected);
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort_by(|a, b| a.try_cmp(b, "test").unwrap().unwrap());
        prop_assert_eq!(ids, sorted);
    }

    #[test]
    fn group_counts_cover_every_row(values in prop::collection::vec(-50i64..50, 1..40)) {
        let catalog = numbers_catalog(&values);
        let outcome = run_with(&catalog, vec![vec![
            Block::new("data_numbers"),
            Block::new("dplyr_groupby").field("Column", Block::column("k")),
            Block::new("dplyr_summarize").field("Column", aggregate("count", "v")),
        ]]);
        prop_assert!(outcome.result.is_ok());
        let rows = final_table(&outcome);
        let total: i64 = rows
            .iter()
            .map(|r| match r["v"] { Value::Int(n) => n, _ => unreachable!() })
            .sum();
        prop_assert_eq!(total, values.len() as i64);
        let first_key = Value::Int(values[0].rem_euclid(3));
        prop_assert_eq!(&rows[0][INDEX_COLUMN], &first_key);
    }

    #[test]
    fn mutate_preserves_row_count(values in prop::collection::vec(-1000i64..1000, 0..40)) {
        let catalog = numbers_catalog(&values);
        let doubled = Block::new("stats_arithmetic")
            .field("OP", "MUL")
            .field("A", Block::column("v"))
            .field("B", Block::number(2));
        let outcome = run_with(&catalog, vec![vec![
            Block::new("data_numbers"),
            Block::new("dplyr_mutate").field("newCol", "w").field("Column", doubled),
        ]]);
        prop_assert!(outcome.result.is_ok());
        let rows = final_table(&outcome);
        prop_assert_eq!(rows.len(), values.len());
        for (r, v) in rows.iter().zip(&values) {
            prop_assert_eq!(&r["w"], &Value::Int(v * 2));
        }
    }

    #[test]
    fn join_pairs_every_matching_key(
        left in prop::collection::vec(-20i64..20, 0..15),
        right in prop::collection::vec(-20i64..20, 0..15),
    ) {
        let joined = join(&numbers_table(&left), "k", &numbers_table(&right), "k").unwrap();
        let expected = left
            .iter()
            .map(|l| right.iter().filter(|r| l.rem_euclid(3) == r.rem_euclid(3)).count())
            .sum::<usize>();
        prop_assert_eq!(joined.len(), expected);
        let columns = ["_join_", "left_id", "left_v", "right_id", "right_v"];
        for r in joined.rows() {
            let keys: Vec<_> = r.keys().map(String::as_str).collect();
            prop_assert_eq!(&keys[..], &columns[..]);
            let left_v = match r["left_v"] { Value::Int(v) => v, _ => unreachable!() };
            let right_v = match r["right_v"] { Value::Int(v) => v, _ => unreachable!() };
            prop_assert_eq!(left_v.rem_euclid(3), right_v.rem_euclid(3));
            prop_assert_eq!(&r["_join_"], &Value::Int(left_v.rem_euclid(3)));
        }
    }
}
