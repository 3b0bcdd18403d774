mod cases;

use cases::{ints, strs};
use formula::Value;

// Literals

test_case!(
    integer_literal,
    input: "42",
    value: 42,
);

test_case!(
    underscored_integer,
    input: "1_000_000",
    value: 1_000_000,
);

test_case!(
    float_literal,
    input: "0.25",
    value: 0.25,
);

test_case!(
    string_literal,
    input: r#""double" + 'single'"#,
    value: "doublesingle",
);

test_case!(
    none_literal,
    input: "None",
    value: Value::None,
);

// Arithmetic

test_case!(
    precedence,
    input: "2 + 3 * 4 - 1",
    value: 13,
);

test_case!(
    true_division_is_float,
    input: "9 / 3",
    value: 3.0,
);

test_case!(
    floor_division_rounds_down,
    input: "-7 // 2",
    value: -4,
);

test_case!(
    modulo_takes_divisor_sign,
    input: "7 % -3",
    value: -2,
);

test_case!(
    power_is_right_associative,
    input: "2 ** 3 ** 2",
    value: 512,
);

test_case!(
    mixed_int_and_float,
    input: "1 + 0.5",
    value: 1.5,
);

test_case!(
    division_by_zero,
    input: "1 / 0",
    error: Eval("division by zero"),
);

test_case!(
    string_times_string_is_rejected,
    input: "'a' * 'b'",
    error: Type(""),
);

test_case!(
    string_plus_int_is_rejected,
    input: "'a' + 1",
    error: Type(""),
);

// Boolean operators return the deciding operand

test_case!(
    or_returns_first_truthy_operand,
    input: "0 or 'fallback'",
    value: "fallback",
);

test_case!(
    and_returns_last_operand,
    input: "'x' and 5",
    value: 5,
);

test_case!(
    and_stops_at_first_falsy,
    input: "[] and undefined_name",
    value: Value::list(vec![]),
);

test_case!(
    not_is_boolean,
    input: "not 'text'",
    value: false,
);

// Comparisons

test_case!(
    equality_across_numeric_types,
    input: "2 == 2.0",
    value: true,
);

test_case!(
    membership_in_dict_keys,
    input: "'a' in {'a': 1}",
    value: true,
);

test_case!(
    only_first_comparison_is_evaluated,
    input: "x = 50\n1 <= x <= 10",
    value: true,
);

test_case!(
    ordering_mismatched_types,
    input: "1 < 'a'",
    error: Type(""),
);

// Conditional expression

test_case!(
    conditional_expression,
    input: "'big' if n > 10 else 'small'",
    names: [("n", 11)],
    value: "big",
);

// Collections

test_case!(
    list_literal,
    input: "[1, 1 + 1, 3]",
    value: ints(&[1, 2, 3]),
);

test_case!(
    tuple_literal,
    input: "('a', 'b')",
    value: Value::tuple(vec![Value::str("a"), Value::str("b")]),
);

test_case!(
    set_literal_deduplicates,
    input: "len({1, 2, 2, 3})",
    value: 3,
);

test_case!(
    nested_dict_access,
    input: "{'outer': {'inner': 7}}['outer']['inner']",
    value: 7,
);

test_case!(
    string_slicing,
    input: "'formula'[:4]",
    value: "form",
);

test_case!(
    slice_with_huge_step,
    input: "[1, 2, 3][1::9223372036854775807]",
    value: ints(&[2]),
);

test_case!(
    slice_with_huge_negative_step,
    input: "[1, 2, 3][::-9223372036854775807]",
    value: ints(&[3]),
);

test_case!(
    negative_index,
    input: "['a', 'b', 'c'][-1]",
    value: "c",
);

test_case!(
    list_concatenation,
    input: "['a'] + ['b']",
    value: strs(&["a", "b"]),
);

// Names

test_case!(
    names_are_visible,
    input: "price * qty",
    names: [("price", 2.5), ("qty", 4)],
    value: 10.0,
);

test_case!(
    missing_name,
    input: "price * 2",
    error: NameNotDefined("price"),
);

test_case!(
    missing_function,
    input: "no_such_function(1)",
    error: FunctionNotDefined("no_such_function"),
);

test_case!(
    calling_a_non_callable,
    input: "x(1)",
    names: [("x", 1)],
    error: FunctionNotDefined("x"),
);

// Syntax errors

test_case!(
    unbalanced_parenthesis,
    input: "(1 + 2",
    error: Syntax(""),
);

test_case!(
    dangling_operator,
    input: "1 +",
    error: Syntax(""),
);
