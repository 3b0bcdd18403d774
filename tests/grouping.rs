mod cases;

use chrono::NaiveDate;
use formula::{Context, Engine, Value};
use indoc::indoc;

const RANGES: &str = "[[1, 10, 'o1'], [10, 20, 'o2']]";

#[test]
fn simple_group_matches_first_range() {
    let run = |value: &str| {
        formula::evaluate(&format!("simple_group({value}, {RANGES}, 'o3')"), &[]).unwrap()
    };
    assert_eq!(run("5"), Value::str("o1"));
    // Upper bounds are inclusive, so 10 lands in the first range.
    assert_eq!(run("10"), Value::str("o1"));
    assert_eq!(run("15"), Value::str("o2"));
    assert_eq!(run("25"), Value::str("o3"));
    // Lower bounds are exclusive.
    assert_eq!(run("1"), Value::str("o3"));
}

test_case!(
    simple_group_with_open_ranges,
    input: "simple_group(amount, [[None, 0, 'debit'], [0, None, 'credit']], '')",
    names: [("amount", -12.5)],
    value: "debit",
);

test_case!(
    simple_group_from_a_name,
    input: indoc! {"
        buckets = [(0, 1000, 'small'), (1000, 100000, 'large')]
        simple_group(volume, buckets, 'unknown')
    "},
    names: [("volume", 5000)],
    value: "large",
);

test_case!(
    date_group_by_fixed_ranges,
    input: indoc! {"
        ranges = [
            (None, date(2023, 12, 31), None, 'before 2024'),
            (date(2024, 1, 1), date(2024, 12, 31), None, '2024')
        ]
        date_group(trade_date, ranges, 'later')
    "},
    names: [("trade_date", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())],
    value: "2024",
);

test_case!(
    date_group_monthly_buckets,
    input: indoc! {"
        ranges = [(date(2024, 1, 1), date(2024, 12, 31), months(1),
                   ('', '%b', ' to ', '', '%b %Y', ''))]
        date_group(date(2024, 3, 18), ranges, None)
    "},
    value: "Mar to Apr 2024",
);

test_case!(
    date_group_falls_back_to_default,
    input: "date_group(date(1850, 1, 1), [(None, None, None, 'any')], 'too old')",
    value: "too old",
);

#[test]
fn date_group_can_return_bucket_bounds() {
    let engine = Engine::default();
    let context = Context::from_iter([("date_group_with_dates", true)]);
    let source = "date_group(date(2024, 5, 9), [(date(2024, 1, 1), None, weeks(1), 'week')], '')";
    let value = engine
        .evaluate_with_options(source, &[], context, &engine.options().execution)
        .unwrap();
    let date = |d| Value::Date(NaiveDate::from_ymd_opt(2024, 5, d).unwrap());
    assert_eq!(value, Value::tuple(vec![Value::str("week"), date(6), date(13)]));
}
