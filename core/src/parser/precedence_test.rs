use crate::parser::{Expr, ExprKind, Literal, StmtKind};

use super::parser::parse;

// Render an expression as an s-expression, ignoring spans.
//
// We test precedence by comparing whether two expressions parenthesized in
// different ways yield the same shape.
fn shape(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal(Literal::None) => "None".into(),
        ExprKind::Literal(Literal::Bool(b)) => b.to_string(),
        ExprKind::Literal(Literal::Int(i)) => i.to_string(),
        ExprKind::Literal(Literal::Float(f)) => f.to_string(),
        ExprKind::Literal(Literal::Str(s)) => format!("{s:?}"),
        ExprKind::Name(name) => name.clone(),
        ExprKind::List(items) => format!("[{}]", join(items)),
        ExprKind::Tuple(items) => format!("(tuple {})", join(items)),
        ExprKind::Set(items) => format!("(set {})", join(items)),
        ExprKind::Dict(pairs) => {
            let pairs: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}:{}", shape(k), shape(v)))
                .collect();
            format!("{{{}}}", pairs.join(" "))
        }
        ExprKind::Binary { op, left, right } => {
            format!("({op} {} {})", shape(left), shape(right))
        }
        ExprKind::Unary { op, operand } => format!("({op} {})", shape(operand)),
        ExprKind::Boolean { op, values } => format!("({op:?} {})", join(values)),
        ExprKind::Comparison { left, comparators } => {
            let mut out = format!("(cmp {}", shape(left));
            for (op, right) in comparators {
                out.push_str(&format!(" {op} {}", shape(right)));
            }
            out.push(')');
            out
        }
        ExprKind::IfExp { test, body, orelse } => {
            format!("(if {} {} {})", shape(test), shape(body), shape(orelse))
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            let mut out = format!("(call {}", shape(func));
            for arg in args {
                out.push(' ');
                out.push_str(&shape(arg));
            }
            for (name, value) in keywords {
                out.push_str(&format!(" {name}={}", shape(value)));
            }
            out.push(')');
            out
        }
        ExprKind::Subscript { value, index } => format!("(idx {} {})", shape(value), shape(index)),
        ExprKind::Slice { lower, upper, step } => {
            let part = |e: &Option<Box<Expr>>| e.as_ref().map_or("_".to_string(), |e| shape(e));
            format!("(slice {} {} {})", part(lower), part(upper), part(step))
        }
        ExprKind::Attribute { value, attr } => format!("(. {} {attr})", shape(value)),
    }
}

fn join(items: &[Expr]) -> String {
    items.iter().map(shape).collect::<Vec<_>>().join(" ")
}

fn ast(source: &str) -> String {
    let tree = parse(source)
        .unwrap_or_else(|e| panic!("Expression parsing failed: {}\n{}", source, e));
    match &tree.body[..] {
        [stmt] => match &stmt.kind {
            StmtKind::Expr(expr) => shape(expr),
            other => panic!("expected an expression statement, got {other:?}"),
        },
        other => panic!("expected one statement, got {}", other.len()),
    }
}

#[test]
fn test_addition_vs_subtraction() {
    assert_eq!(ast("a + b - c"), ast("(a + b) - c"));
    assert_eq!(ast("a - b + c"), ast("(a - b) + c"));
    assert_eq!(
        ast("a + b - c + d - e + f"),
        ast("((((a + b) - c) + d) - e) + f")
    );
}

#[test]
fn test_multiplicative_operators() {
    assert_eq!(ast("a * b / c"), ast("(a * b) / c"));
    assert_eq!(ast("a // b % c"), ast("(a // b) % c"));
    assert_eq!(ast("a + b * c"), ast("a + (b * c)"));
    assert_eq!(ast("a * b + c"), ast("(a * b) + c"));
}

#[test]
fn test_power_is_right_associative() {
    assert_eq!(ast("a ** b ** c"), ast("a ** (b ** c)"));
    assert_eq!(ast("a ** b ** c"), "(** a (** b c))");
}

#[test]
fn test_unary_minus_vs_power() {
    assert_eq!(ast("-a ** b"), ast("-(a ** b)"));
    assert_eq!(ast("a ** -b"), ast("a ** (-b)"));
    assert_eq!(ast("-a * b"), ast("(-a) * b"));
}

#[test]
fn test_and_vs_or() {
    assert_eq!(
        ast("True and False or True"),
        ast("(True and False) or True")
    );
    assert_eq!(
        ast("True or False and True"),
        ast("True or (False and True)")
    );
    assert_eq!(ast("a or b or c"), "(Or a b c)");
}

#[test]
fn test_not_vs_comparison() {
    assert_eq!(ast("not a == b"), ast("not (a == b)"));
    assert_eq!(ast("not a and b"), ast("(not a) and b"));
}

#[test]
fn test_comparison_vs_arithmetic() {
    assert_eq!(ast("a + 1 < b * 2"), ast("(a + 1) < (b * 2)"));
    assert_eq!(ast("a < b <= c"), "(cmp a < b <= c)");
}

#[test]
fn test_membership_and_identity() {
    assert_eq!(ast("a not in b"), "(cmp a not in b)");
    assert_eq!(ast("a is not None"), "(cmp a is not None)");
    assert_eq!(ast("a in b"), "(cmp a in b)");
}

#[test]
fn test_bitwise_levels() {
    assert_eq!(ast("a | b ^ c & d"), ast("a | (b ^ (c & d))"));
    assert_eq!(ast("a & b << c"), ast("a & (b << c)"));
    assert_eq!(ast("a << b + c"), ast("a << (b + c)"));
}

#[test]
fn test_ternary_is_lowest() {
    assert_eq!(ast("a or b if c else d"), ast("(a or b) if c else d"));
    assert_eq!(
        ast("a if b else c if d else e"),
        ast("a if b else (c if d else e)")
    );
}

#[test]
fn test_postfix_binds_tightest() {
    assert_eq!(ast("-a.b"), ast("-(a.b)"));
    assert_eq!(ast("a.b[c](d)"), "(call (idx (. a b) c) d)");
    assert_eq!(ast("f(x)[0] ** 2"), ast("(f(x)[0]) ** 2"));
}
