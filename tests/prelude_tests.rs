// ABOUTME: Tests for the guest-language prelude

use symlisp::engine::Engine;
use symlisp::error::EvalError;

fn setup() -> Engine {
    let engine = Engine::new();
    engine.load_prelude().expect("prelude loads");
    engine
}

fn eval_to_string(engine: &Engine, src: &str) -> String {
    engine
        .eval_str(src)
        .unwrap_or_else(|e| panic!("{} failed: {}", src, e))
        .to_string()
}

#[test]
fn test_abs() {
    let engine = setup();
    assert_eq!(eval_to_string(&engine, "(abs -5)"), "5");
    assert_eq!(eval_to_string(&engine, "(abs 5)"), "5");
    assert_eq!(eval_to_string(&engine, "(abs 0)"), "0");
}

#[test]
fn test_second() {
    let engine = setup();
    assert_eq!(eval_to_string(&engine, "(second '(1 2 3))"), "2");
}

#[test]
fn test_map() {
    let engine = setup();
    assert_eq!(
        eval_to_string(&engine, "(map (lambda (x) (* x 2)) '(1 2 3))"),
        "(2 4 6)"
    );
    assert_eq!(eval_to_string(&engine, "(map identity ())"), "()");
}

#[test]
fn test_filter() {
    let engine = setup();
    assert_eq!(
        eval_to_string(&engine, "(filter (lambda (x) (< 2 x)) '(1 2 3 4 5))"),
        "(3 4 5)"
    );
}

#[test]
fn test_foldl_is_tail_recursive() {
    let engine = setup();
    assert_eq!(eval_to_string(&engine, "(foldl + 0 '(1 2 3 4))"), "10");
    // A long fold must not consume host stack per element.
    assert_eq!(
        eval_to_string(&engine, "(foldl + 0 (range 10000))"),
        "49995000"
    );
}

#[test]
fn test_member() {
    let engine = setup();
    assert_eq!(eval_to_string(&engine, "(member? 2 '(1 2 3))"), "T");
    assert_eq!(eval_to_string(&engine, "(member? 9 '(1 2 3))"), "()");
}

#[test]
fn test_range() {
    let engine = setup();
    assert_eq!(eval_to_string(&engine, "(range 5)"), "(0 1 2 3 4)");
    assert_eq!(eval_to_string(&engine, "(range 0)"), "()");
}

#[test]
fn test_mutually_recursive_parity() {
    let engine = setup();
    assert_eq!(eval_to_string(&engine, "(odd? 7)"), "T");
    assert_eq!(eval_to_string(&engine, "(even? 7)"), "()");
}

#[test]
fn test_prelude_respects_no_prelude_engines() {
    let engine = Engine::new();
    assert!(matches!(
        engine.eval_str("(fac 3)"),
        Err(EvalError::NotBound { .. })
    ));
}
