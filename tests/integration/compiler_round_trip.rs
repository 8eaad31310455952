#![allow(missing_docs)]

use std::collections::BTreeSet;

use blockflow::program::ast::{AggregateFn, ArithmeticOp, CompareOp};
use blockflow::program::emit::to_block_tree;
use blockflow::program::{Block, Expression, Pipeline, Stage, Visualization};
use blockflow::{BlockTree, BlockflowError, Compiler, Program, Value};
use proptest::prelude::*;

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn literal() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000_000i64..1_000_000).prop_map(Value::Int),
        (-40_000i64..40_000)
            .prop_filter("fractional", |k| k % 4 != 0)
            .prop_map(|k| Value::Float(k as f64 / 4.0)),
        "[ -~]{0,12}".prop_map(Value::String),
    ]
}

fn row_expr() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        literal().prop_map(Expression::Literal),
        name().prop_map(Expression::Column),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (compare_op(), inner.clone(), inner.clone())
                .prop_map(|(op, a, b)| Expression::compare(op, a, b)),
            (arithmetic_op(), inner.clone(), inner)
                .prop_map(|(op, a, b)| Expression::arithmetic(op, a, b)),
        ]
    })
}

fn compare_op() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Neq),
        Just(CompareOp::Gt),
        Just(CompareOp::Gte),
        Just(CompareOp::Lt),
        Just(CompareOp::Lte),
    ]
}

fn arithmetic_op() -> impl Strategy<Value = ArithmeticOp> {
    prop_oneof![
        Just(ArithmeticOp::Add),
        Just(ArithmeticOp::Sub),
        Just(ArithmeticOp::Mul),
        Just(ArithmeticOp::Div),
        Just(ArithmeticOp::Mod),
        Just(ArithmeticOp::Exp),
    ]
}

fn aggregate() -> impl Strategy<Value = Expression> {
    let func = prop_oneof![
        Just(AggregateFn::Sum),
        Just(AggregateFn::Mean),
        Just(AggregateFn::Count),
        Just(AggregateFn::Min),
        Just(AggregateFn::Max),
    ];
    (func, name()).prop_map(|(func, column)| Expression::aggregate(func, column))
}

fn middle_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        prop::collection::btree_set(name(), 1..4).prop_map(|columns| Stage::Select { columns }),
        row_expr().prop_map(|predicate| Stage::Filter { predicate }),
        (name(), row_expr()).prop_map(|(column, value)| Stage::Mutate { column, value }),
        name().prop_map(|column| Stage::Group { column }),
        prop::collection::vec(aggregate(), 1..4)
            .prop_map(|aggregates| Stage::Summarize { aggregates }),
        name().prop_map(|name| Stage::Notify { name }),
    ]
}

fn source_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        name().prop_map(|source| Stage::Load { source }),
        (name(), name(), name(), name()).prop_map(
            |(left_name, left_column, right_name, right_column)| Stage::Join {
                left_name,
                left_column,
                right_name,
                right_column,
            }
        ),
    ]
}

fn plot() -> impl Strategy<Value = Visualization> {
    prop_oneof![
        (name(), 1usize..50).prop_map(|(column, bins)| Visualization::Histogram { column, bins }),
        (name(), name()).prop_map(|(x, y)| Visualization::Bar { x, y }),
        (name(), name(), prop::option::of(name()))
            .prop_map(|(x, y, color)| Visualization::Scatter { x, y, color }),
    ]
}

fn pipeline() -> impl Strategy<Value = Pipeline> {
    (
        source_stage(),
        prop::collection::vec(middle_stage(), 0..5),
        prop::option::of(plot()),
    )
        .prop_map(|(source, middle, plot)| {
            let mut stages = vec![source];
            stages.extend(middle);
            stages.extend(plot.map(Stage::Visualize));
            Pipeline::new(stages)
        })
}

proptest! {
    #[test]
    fn emitted_program_compiles_back(pipelines in prop::collection::vec(pipeline(), 0..4)) {
        let program = Program::new(pipelines);
        let tree = to_block_tree(&program);
        let out = Compiler::new().build(&tree).unwrap();
        prop_assert_eq!(out.stray_count, 0);
        prop_assert_eq!(out.program, program);
    }

    #[test]
    fn json_text_survives_round_trip(pipelines in prop::collection::vec(pipeline(), 1..3)) {
        let program = Program::new(pipelines);
        let text = to_block_tree(&program).to_json_string().unwrap();
        let tree = BlockTree::from_json_str(&text).unwrap();
        prop_assert_eq!(Compiler::new().build(&tree).unwrap().program, program);
    }
}

#[test]
fn parses_editor_json() {
    let text = r#"{
        "stacks": [
            {"id": "d1", "type": "data_colors",
             "next": {"id": "f1", "type": "dplyr_filter",
                      "fields": {"Column": {
                          "id": "c1", "type": "variable_compare",
                          "fields": {
                              "OP": "NEQ",
                              "A": {"type": "variable_column", "fields": {"TEXT": "red"}},
                              "B": {"type": "variable_number", "fields": {"NUM": 0}}}}}}},
            {"id": "s1", "type": "variable_column", "fields": {"TEXT": "orphan"}}
        ]
    }"#;
    let tree = BlockTree::from_json_str(text).unwrap();
    let out = Compiler::new().build(&tree).unwrap();
    assert_eq!(out.stray_count, 1);
    assert_eq!(
        out.program.pipelines,
        vec![Pipeline::new(vec![
            Stage::Load {
                source: "colors".into()
            },
            Stage::Filter {
                predicate: Expression::compare(
                    CompareOp::Neq,
                    Expression::column("red"),
                    Expression::literal(0i64),
                ),
            },
        ])]
    );
}

#[test]
fn histogram_without_bins_uses_configured_default() {
    let tree = BlockTree::from_stacks([vec![
        Block::new("data_colors"),
        Block::new("ggplot_hist").field("Column", Block::column("red")),
    ]]);
    let out = Compiler::new().with_default_bins(7).build(&tree).unwrap();
    assert_eq!(
        out.program.pipelines[0].stages[1],
        Stage::Visualize(Visualization::Histogram {
            column: "red".into(),
            bins: 7,
        })
    );
}

#[test]
fn plot_in_the_middle_is_rejected() {
    let tree = BlockTree::from_stacks([vec![
        Block::new("data_colors"),
        Block::new("ggplot_bar")
            .with_id("bar")
            .field("X_axis", Block::column("name"))
            .field("Y_axis", Block::column("red")),
        Block::new("plumbing_notify").field("name", "t"),
    ]]);
    match Compiler::new().build(&tree).unwrap_err() {
        BlockflowError::Compile { block_id, .. } => assert_eq!(block_id.0, "bar"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn aggregate_outside_summarize_is_rejected() {
    let tree = BlockTree::from_stacks([vec![
        Block::new("data_colors"),
        Block::new("dplyr_mutate").field("newCol", "total").field(
            "Column",
            Block::new("stats_sum")
                .with_id("agg")
                .field("Column", Block::column("red")),
        ),
    ]]);
    let err = Compiler::new().build(&tree).unwrap_err();
    assert_eq!(err.code(), "CompileError");
    assert!(err.to_string().contains("'agg'"), "{err}");
}

#[test]
fn select_collapses_duplicate_columns() {
    let tree = BlockTree::from_stacks([vec![
        Block::new("data_colors"),
        Block::new("dplyr_select").field(
            "Column",
            vec![Block::column("red"), Block::column("red")],
        ),
    ]]);
    let out = Compiler::new().build(&tree).unwrap();
    assert_eq!(
        out.program.pipelines[0].stages[1],
        Stage::Select {
            columns: BTreeSet::from(["red".to_owned()])
        }
    );
}

#[test]
fn block_without_type_is_a_compile_error() {
    let text = r#"{"stacks": [{"id": "b1", "type": "data_colors",
                               "next": {"id": "b2", "fields": {}}}]}"#;
    let tree = BlockTree::from_json_str(text).unwrap();
    match Compiler::new().build(&tree).unwrap_err() {
        BlockflowError::Compile { block_id, reason } => {
            assert_eq!(block_id.0, "b2");
            assert!(reason.contains("type"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn null_field_is_reported_against_its_block() {
    let text = r#"{"stacks": [{"id": "d1", "type": "data_colors",
                               "next": {"id": "p1", "type": "ggplot_point",
                                        "fields": {
                                            "X_axis": "red",
                                            "Y_axis": "green",
                                            "color": null}}}]}"#;
    let tree = BlockTree::from_json_str(text).unwrap();
    let err = Compiler::new().build(&tree).unwrap_err();
    assert_eq!(err.code(), "CompileError");
    match err {
        BlockflowError::Compile { block_id, reason } => {
            assert_eq!(block_id.0, "p1");
            assert!(reason.contains("color"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn boolean_field_is_reported_against_its_block() {
    let text = r#"{"stacks": [{"id": "d1", "type": "data_colors",
                               "next": {"id": "n1", "type": "plumbing_notify",
                                        "fields": {"name": true}}}]}"#;
    let tree = BlockTree::from_json_str(text).unwrap();
    match Compiler::new().build(&tree).unwrap_err() {
        BlockflowError::Compile { block_id, .. } => assert_eq!(block_id.0, "n1"),
        other => panic!("unexpected error {other:?}"),
    }
}
