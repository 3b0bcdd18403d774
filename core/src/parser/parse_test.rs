use indoc::indoc;
use pretty_assertions::assert_eq;

use super::parser::{parse, parse_with_max_depth};
use crate::errors::ErrorKind;
use crate::parser::{ExprKind, Literal, StmtKind};

#[test]
fn test_valid_scripts() {
    let examples = [
        "1 + 2",
        "a * b + c",
        "x if y else z",
        "foo(1, 2, key=3)",
        "[1, 2, 3]",
        "(1,)",
        "()",
        "{'a': 1, 'b': 2}",
        "{1, 2}",
        "{}",
        "a[1:2]",
        "a[::2]",
        "a[:-1]",
        "a.b.c",
        "'abc' 'def'",
        "x = 1",
        "a = b = 2",
        "m['k'] = 1",
        "m.k = 1",
        "x = 1; y = 2",
        "return 5",
        "pass",
        "1 <= a <= 10",
        "not x",
        "~5",
        "a is not None",
        "a not in b",
        "if x: y",
        "while False: pass",
        "for i in range(3): i",
        "def f(a, b=2): return a + b",
    ];

    for example in examples {
        if let Err(e) = parse(example) {
            panic!("failed to parse {example:?}: {e}");
        }
    }
}

#[test]
fn test_invalid_scripts() {
    let examples = [
        "1 +",
        "(1, 2",
        "[1, 2",
        "{'a' 1}",
        "a b",
        "1 = x",
        "f(a=1, 2)",
        "f(a=1, a=2)",
        "def f(a=1, b): pass",
        "def f(a, a): pass",
        "break",
        "if x:\ny",
        "try:\n    pass",
        "x = ",
        "a if b",
        "@",
    ];

    for example in examples {
        match parse(example) {
            Ok(tree) => panic!("expected {example:?} to fail, got {:?}", tree.body),
            Err(e) => assert!(e.is_syntax(), "{example:?}: {e}"),
        }
    }
}

#[test]
fn test_empty_script() {
    for source in ["", "   ", "\n\n"] {
        let err = parse(source).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Invalid("Empty expression".into()));
    }
}

#[test]
fn test_if_elif_else() {
    let tree = parse(indoc! {"
        if a:
            1
        elif b:
            2
        else:
            3
    "})
    .unwrap();
    assert_eq!(tree.body.len(), 1);
    let StmtKind::If { body, orelse, .. } = &tree.body[0].kind else {
        panic!("expected if statement");
    };
    assert_eq!(body.len(), 1);
    let StmtKind::If { orelse: inner, .. } = &orelse[0].kind else {
        panic!("expected elif to nest an if statement");
    };
    assert_eq!(inner.len(), 1);
}

#[test]
fn test_nested_blocks() {
    let tree = parse(indoc! {"
        total = 0
        for i in range(10):
            if i > 5:
                break
            total = total + i
        total
    "})
    .unwrap();
    assert_eq!(tree.body.len(), 3);
    let StmtKind::For { body, .. } = &tree.body[1].kind else {
        panic!("expected for loop");
    };
    assert_eq!(body.len(), 2);
}

#[test]
fn test_function_definition() {
    let tree = parse(indoc! {"
        def scale(x, factor=2):
            return x * factor
        scale(4)
    "})
    .unwrap();
    let StmtKind::FunctionDef(def) = &tree.body[0].kind else {
        panic!("expected function definition");
    };
    assert_eq!(def.name, "scale");
    assert_eq!(def.params.len(), 2);
    assert!(def.params[0].default.is_none());
    assert!(def.params[1].default.is_some());
}

#[test]
fn test_break_inside_function_inside_loop() {
    let err = parse(indoc! {"
        while True:
            def f():
                break
    "})
    .unwrap_err();
    assert!(err.is_syntax());
}

#[test]
fn test_try_statement() {
    let tree = parse(indoc! {"
        try:
            1 / 0
        except ZeroDivisionError as e:
            0
        except:
            1
        else:
            2
        finally:
            3
    "})
    .unwrap();
    let StmtKind::Try {
        handlers,
        orelse,
        finalbody,
        ..
    } = &tree.body[0].kind
    else {
        panic!("expected try statement");
    };
    assert_eq!(handlers.len(), 2);
    assert_eq!(handlers[0].name.as_deref(), Some("e"));
    assert_eq!(orelse.len(), 1);
    assert_eq!(finalbody.len(), 1);
}

#[test]
fn test_adjacent_strings_concatenate() {
    let tree = parse("'ab' \"cd\"").unwrap();
    let StmtKind::Expr(expr) = &tree.body[0].kind else {
        panic!("expected expression");
    };
    assert_eq!(expr.kind, ExprKind::Literal(Literal::Str("abcd".into())));
}

#[test]
fn test_for_tuple_target() {
    let tree = parse("for k, v in items: k").unwrap();
    let StmtKind::For { target, .. } = &tree.body[0].kind else {
        panic!("expected for loop");
    };
    assert!(matches!(&target.kind, ExprKind::Tuple(names) if names.len() == 2));
}

#[test]
fn test_spans_point_into_source() {
    let source = "x = foo(1)";
    let tree = parse(source).unwrap();
    let StmtKind::Assign { value, .. } = &tree.body[0].kind else {
        panic!("expected assignment");
    };
    assert_eq!(value.span.str_of(source), "foo(1)");
}

#[test]
fn test_max_depth() {
    let deep = format!("{}1{}", "(".repeat(50), ")".repeat(50));
    assert!(parse_with_max_depth(&deep, 200).is_ok());
    let err = parse_with_max_depth(&deep, 20).unwrap_err();
    assert!(err.is_syntax());
    assert!(err.message().contains("Nesting depth"));
}

#[test]
fn test_deep_unary_chain_is_bounded() {
    let deep = format!("{}1", "-".repeat(10_000));
    assert!(parse(&deep).unwrap_err().is_syntax());
}

#[test]
fn test_long_operator_chains_are_bounded() {
    let moderate = format!("1{}", " + 1".repeat(50));
    assert!(parse(&moderate).is_ok());

    for source in [
        format!("1{}", "+1".repeat(200_000)),
        format!("1{}", "*2".repeat(200_000)),
        format!("x{}", ".y".repeat(200_000)),
        format!("f{}", "()".repeat(200_000)),
        format!("xs{}", "[0]".repeat(200_000)),
    ] {
        let err = parse(&source).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.message().contains("Nesting depth"), "{}", err.message());
    }
}

#[test]
fn test_long_elif_chain_is_bounded() {
    let mut source = String::from("if x == 0:\n    pass\n");
    for i in 1..50_000 {
        source.push_str(&format!("elif x == {i}:\n    pass\n"));
    }
    assert!(parse(&source).unwrap_err().is_syntax());
}
