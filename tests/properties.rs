//! Algebraic properties of queries, checked over exhaustive enumerations of small
//! queries and assignments.

use std::collections::HashMap;

use redescription_rs::config::{SearchVariant, TreeSearchConfig};
use redescription_rs::dataset::{Column, Data, Dataset};
use redescription_rs::display::RenderStyle;
use redescription_rs::fit::CartFitter;
use redescription_rs::literal::Literal;
use redescription_rs::query::{Node, Query};
use redescription_rs::search::{pick_step, TreeSearch};
use redescription_rs::term::Term;
use redescription_rs::truth_table::TruthTable;
use redescription_rs::types::{Op, Side, Value};

const N_COLS: usize = 4;

fn b(col: usize) -> Literal {
    Literal::positive(Term::boolean(col))
}

fn literals(n: usize) -> Vec<Literal> {
    (0..n).flat_map(|c| [b(c), -b(c)]).collect()
}

fn assignments(n: usize) -> Vec<HashMap<usize, Value<'static>>> {
    (0..1u32 << n)
        .map(|m| (0..n).map(|c| (c, Value::Bool(m >> c & 1 == 1))).collect())
        .collect()
}

fn equivalent(q: &Query, r: &Query) -> bool {
    assignments(N_COLS).iter().all(|a| q.truth_eval(a) == r.truth_eval(a))
}

/// Small queries of every shape: literals, flat buckets, one nested bucket, two
/// nested buckets, and buckets carrying negation markers.
fn small_queries() -> Vec<Query> {
    let lits = literals(3);
    let leaf = |l: &Literal| Node::Leaf(l.clone());
    let mut out: Vec<Query> = lits.iter().cloned().map(Query::literal).collect();
    for op in [Op::And, Op::Or] {
        for (i, x) in lits.iter().enumerate() {
            for y in &lits[i + 1..] {
                out.push(Query::new(op, vec![leaf(x), leaf(y)]));
                for z in &lits {
                    out.push(Query::new(op, vec![leaf(x), Node::Group(vec![leaf(y), leaf(z)])]));
                    out.push(Query::new(op, vec![Node::Neg, leaf(z), Node::Group(vec![leaf(x), leaf(y)])]));
                    out.push(Query::new(
                        op,
                        vec![leaf(z), Node::Group(vec![Node::Neg, leaf(x), leaf(y)])],
                    ));
                }
            }
        }
        for x in &lits {
            for y in &lits {
                for z in &lits {
                    out.push(Query::new(
                        op,
                        vec![
                            Node::Group(vec![leaf(x), leaf(y)]),
                            Node::Group(vec![leaf(z), Node::Leaf(b(3))]),
                        ],
                    ));
                }
            }
        }
    }
    out
}

// ─── Negation ──────────────────────────────────────────────────────────────────

#[test]
fn negation_is_an_involution() {
    for q in small_queries() {
        let pushed = q.clone().push_negation();
        assert_eq!(q.negate().negate(), pushed, "{}", q);
    }
}

#[test]
fn negation_complements_truth() {
    for q in small_queries() {
        let n = q.negate();
        for a in assignments(N_COLS) {
            assert_eq!(n.truth_eval(&a), !q.truth_eval(&a), "{} vs {}", q, n);
        }
    }
}

#[test]
fn push_negation_is_idempotent() {
    for q in small_queries() {
        let once = q.clone().push_negation();
        assert!(once.nodes().iter().all(|n| !matches!(n, Node::Neg)));
        assert_eq!(once.clone().push_negation(), once);
        assert!(equivalent(&q, &once), "{}", q);
    }
}

// ─── Normalization ─────────────────────────────────────────────────────────────

#[test]
fn normalization_preserves_truth() {
    for q in small_queries() {
        let (r, _) = q.algebraic_normalize();
        assert!(equivalent(&q, &r), "{} normalized into {}", q, r);
    }
}

#[test]
fn normalization_is_stable() {
    for q in small_queries() {
        let (r, _) = q.algebraic_normalize();
        let (s, _) = r.algebraic_normalize();
        assert!(equivalent(&r, &s), "{} then {}", r, s);
    }
}

#[test]
fn normalization_over_six_literals() {
    // (v0 & v1) | (v2 & v3) | (v4 & v5), and its negation
    let q = Query::new(
        Op::Or,
        (0..3)
            .map(|i| Node::Group(vec![Node::Leaf(b(2 * i)), Node::Leaf(b(2 * i + 1))]))
            .collect(),
    );
    for q in [q.clone(), q.negate()] {
        let (r, _) = q.algebraic_normalize();
        for a in assignments(6) {
            assert_eq!(q.truth_eval(&a), r.truth_eval(&a), "{} vs {}", q, r);
        }
    }
}

#[test]
fn normalization_absorbs_redundant_disjunct() {
    let q = Query::parse("v0 | (v0 & v1)").unwrap();
    let (r, changed) = q.algebraic_normalize();
    assert!(changed);
    assert_eq!(r, Query::parse("v0").unwrap());
}

// ─── Complements ───────────────────────────────────────────────────────────────

#[test]
fn complement_negates_away_from_the_bound() {
    let terms = [
        Term::numerical(0, f64::NEG_INFINITY, 3.0).unwrap(),
        Term::numerical(0, -1.5, f64::INFINITY).unwrap(),
    ];
    for t in &terms {
        let c = t.complement().unwrap();
        assert!(t.is_complement(&c));
        assert!(c.is_complement(t));
        assert_eq!(c.complement().as_ref(), Some(t));
        for x in [-10.0, -2.0, 0.0, 2.5, 3.5, 100.0] {
            assert_eq!(c.truth_eval(Value::Num(x)), !t.truth_eval(Value::Num(x)), "{} at {}", t, x);
        }
    }
    assert!(Term::numerical(0, 1.0, 2.0).unwrap().complement().is_none());
    assert!(Term::boolean(0).complement().is_none());
}

#[test]
fn normalization_with_complements_preserves_truth() {
    let le = Term::numerical(0, f64::NEG_INFINITY, 3.0).unwrap();
    let ge = le.complement().unwrap();
    let q = Query::new(
        Op::Or,
        vec![
            Node::Group(vec![Node::Leaf(Literal::positive(le)), Node::Leaf(b(1))]),
            Node::Group(vec![Node::Leaf(Literal::positive(ge)), Node::Leaf(b(1))]),
        ],
    );
    let (r, _) = q.algebraic_normalize();
    for x in [0.0, 2.0, 4.0, 8.0] {
        for flag in [false, true] {
            let a: HashMap<usize, Value<'_>> = [(0, Value::Num(x)), (1, Value::Bool(flag))].into_iter().collect();
            assert_eq!(q.truth_eval(&a), r.truth_eval(&a), "{} vs {} at x={}", q, r, x);
        }
    }
}

// ─── QTree ─────────────────────────────────────────────────────────────────────

#[test]
fn qtree_round_trip_preserves_truth() {
    let mut checked = 0;
    for q in small_queries() {
        let Some(tree) = q.to_qtree() else {
            continue;
        };
        checked += 1;
        assert!(equivalent(&q, &tree.get_query()), "{} vs {}", q, tree.get_query());
        assert!(equivalent(&q, &tree.simplified_query()), "{}", q);
    }
    assert!(checked > 100);
}

// ─── Truth-table minimizer ─────────────────────────────────────────────────────

#[test]
fn minimizer_fold_scenario() {
    let (t, changed) = TruthTable::from_values(&[&[1, 1, 0], &[1, 0, 0]]).fold_rows();
    assert!(changed);
    assert_eq!(t.to_values(), vec![vec![1, -1, 0]]);
}

#[test]
fn minimizer_is_sound_on_four_columns() {
    // Deterministic pseudo-random subsets of the 16 assignments.
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    for _ in 0..500 {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        let subset = (state >> 32) as u16;
        let mut table = TruthTable::new(4);
        let rows: Vec<Vec<i8>> = (0..16u32)
            .filter(|m| subset >> m & 1 == 1)
            .map(|m| (0..4).map(|c| (m >> c & 1) as i8).collect())
            .collect();
        for row in &rows {
            table.push_row(row.iter().map(|&v| v.into()).collect());
        }
        let simplified = table.clone().simplify();
        assert!(simplified.n_rows() <= table.n_rows());
        for m in 0..16u32 {
            let a: Vec<bool> = (0..4).map(|c| m >> c & 1 == 1).collect();
            assert_eq!(simplified.accepts(&a), table.accepts(&a), "subset {:#06x}", subset);
        }
    }
}

// ─── Text form ─────────────────────────────────────────────────────────────────

#[test]
fn render_then_parse_is_equivalent() {
    for q in small_queries() {
        for style in [RenderStyle::Plain, RenderStyle::Math] {
            let text = q.render(style, None);
            let parsed = Query::parse(&text).unwrap_or_else(|e| panic!("{}: {}", text, e));
            assert!(equivalent(&q, &parsed), "{} vs {}", text, parsed);
        }
    }
}

// ─── Tree search ───────────────────────────────────────────────────────────────

fn doubled(n: usize) -> Data {
    let mut data = Data::new(n);
    data.add_column(Side::Left, "v", Column::Numerical((0..n).map(|i| Some(i as f64)).collect()))
        .unwrap();
    data.add_column(Side::Right, "w", Column::Numerical((0..n).map(|i| Some(2.0 * i as f64)).collect()))
        .unwrap();
    data
}

#[test]
fn search_converges_on_doubled_column() {
    let data = doubled(30);
    let seed = Query::parse("0 <= v0 <= 10").unwrap();
    for variant in [SearchVariant::Cartwheel, SearchVariant::Sprit, SearchVariant::Split] {
        let config = TreeSearchConfig {
            variant,
            max_rounds: 2,
            ..TreeSearchConfig::default()
        };
        let outcome = TreeSearch::new(&data, CartFitter, config).run(Side::Left, &seed);
        let best = outcome.best.unwrap();
        assert_eq!(best.jaccard, 1.0, "{:?}", variant);
        assert!(outcome.rounds <= 2);
        let (supp, miss) = best.query(Side::Right).support_and_missing(Side::Right, &data);
        assert_eq!(supp.len(), 11);
        assert!(miss.is_empty());
        assert_eq!(data.n_rows(), 30);
    }
}

#[test]
fn pick_step_prefers_later_close_rounds() {
    assert_eq!(pick_step(&[0.0, 0.9, 0.95, 0.40], 0.1), Some(2));
    assert_eq!(pick_step(&[0.8, 0.95, 0.93, 0.94], 0.05), Some(3));
    assert_eq!(pick_step(&[0.8, 0.95, 0.93, 0.94], 0.0), Some(1));
}
