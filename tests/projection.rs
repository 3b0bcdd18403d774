mod cases;

use std::any::Any;

use chrono::NaiveDate;
use formula::{Context, Dict, DomainObject, Engine, Value};
use indoc::indoc;
use pretty_assertions::assert_eq;

struct Currency {
    id: i64,
    code: &'static str,
}

impl DomainObject for Currency {
    fn type_name(&self) -> &str {
        "Currency"
    }

    fn identity(&self) -> Option<Value> {
        Some(Value::Int(self.id))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Instrument {
    id: i64,
    name: &'static str,
    multiplier: f64,
    currency: Currency,
    maturity: NaiveDate,
    country: &'static str,
}

impl DomainObject for Instrument {
    fn type_name(&self) -> &str {
        "Instrument"
    }

    fn identity(&self) -> Option<Value> {
        Some(Value::Int(self.id))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds an `attributes` record the way the host stores them.
fn attribute(user_code: &str, value_type: i64, field: &str, value: Value) -> Value {
    let mut attribute_type = Dict::new();
    attribute_type.insert_str("user_code", Value::str(user_code));
    attribute_type.insert_str("value_type", Value::Int(value_type));
    let mut record = Dict::new();
    record.insert_str("attribute_type", Value::dict(attribute_type));
    record.insert_str(field, value);
    Value::dict(record)
}

fn engine() -> Engine {
    Engine::builder()
        .register_projector(|currency: &Currency, _: &Context| {
            let mut dict = Dict::new();
            dict.insert_str("id", Value::Int(currency.id));
            dict.insert_str("user_code", Value::str(currency.code));
            Ok(dict)
        })
        .register_projector(|instrument: &Instrument, _: &Context| {
            let mut dict = Dict::new();
            dict.insert_str("id", Value::Int(instrument.id));
            dict.insert_str("name", Value::str(instrument.name));
            dict.insert_str("price_multiplier", Value::Float(instrument.multiplier));
            dict.insert_str("maturity_date", Value::Date(instrument.maturity));
            dict.insert_str("pricing_currency", Value::Int(instrument.currency.id));
            dict.insert_str(
                "pricing_currency_object",
                Value::object(Currency {
                    id: instrument.currency.id,
                    code: instrument.currency.code,
                }),
            );
            dict.insert_str("object_permissions", Value::list(vec![Value::str("change")]));
            dict.insert_str(
                "attributes",
                Value::list(vec![
                    attribute("country", 10, "value_string", Value::str(instrument.country)),
                    attribute("rating", 20, "value_float", Value::Float(7.5)),
                ]),
            );
            Ok(dict)
        })
        .build()
}

fn bond() -> Value {
    Value::object(Instrument {
        id: 7,
        name: "Bond 2030",
        multiplier: 0.01,
        currency: Currency { id: 1, code: "EUR" },
        maturity: NaiveDate::from_ymd_opt(2030, 6, 30).unwrap(),
        country: "DE",
    })
}

#[test]
fn fields_are_reachable_by_attribute_and_subscript() {
    let names = [("instrument", bond())];
    let engine = engine();
    assert_eq!(
        engine.evaluate("instrument.price_multiplier * 100", &names).unwrap(),
        Value::Float(1.0)
    );
    assert_eq!(engine.evaluate("instrument['name']", &names).unwrap(), Value::str("Bond 2030"));
}

#[test]
fn expanded_references_replace_plain_keys() {
    let names = [("instrument", bond())];
    let value = engine()
        .evaluate("instrument.pricing_currency.user_code", &names)
        .unwrap();
    assert_eq!(value, Value::str("EUR"));
}

#[test]
fn dates_become_strings() {
    let names = [("instrument", bond())];
    let value = engine().evaluate("instrument.maturity_date", &names).unwrap();
    assert_eq!(value, Value::str("2030-06-30"));
}

#[test]
fn permission_keys_are_hidden() {
    let names = [("instrument", bond())];
    let engine = engine();
    assert_eq!(
        engine.evaluate("instrument['object_permissions']", &names).unwrap(),
        Value::None
    );
    let err = engine
        .evaluate("instrument.object_permissions", &names)
        .unwrap_err();
    assert_eq!(err.type_name(), "AttributeDoesNotExist");
}

#[test]
fn attributes_are_flattened_by_user_code() {
    let names = [("instrument", bond())];
    let source = indoc! {"
        attrs = instrument.attributes
        (attrs['country'], attrs.rating)
    "};
    assert_eq!(
        engine().evaluate(source, &names).unwrap(),
        Value::tuple(vec![Value::str("DE"), Value::Float(7.5)])
    );
}

#[test]
fn objects_inside_host_lists_are_projected() {
    let names = [(
        "currencies",
        Value::list(vec![
            Value::object(Currency { id: 1, code: "EUR" }),
            Value::object(Currency { id: 2, code: "USD" }),
        ]),
    )];
    let source = indoc! {"
        codes = []
        for c in currencies:
            codes.append(c.user_code)
        join(codes, '/')
    "};
    assert_eq!(engine().evaluate(source, &names).unwrap(), Value::str("EUR/USD"));
}

#[test]
fn same_identity_projects_once() {
    let names = [
        ("a", Value::object(Currency { id: 3, code: "GBP" })),
        ("b", Value::object(Currency { id: 3, code: "GBP" })),
    ];
    let source = indoc! {"
        a['touched'] = True
        b['touched']
    "};
    assert_eq!(engine().evaluate(source, &names).unwrap(), Value::Bool(true));
}

#[test]
fn unknown_types_cannot_be_serialized() {
    let names = [("instrument", bond())];
    let err = Engine::default().evaluate("instrument.name", &names).unwrap_err();
    assert_eq!(err.message(), "Instrument can't serialize");
    assert_eq!(err.type_name(), "InvalidExpression");
}

#[test]
fn projector_sees_the_context() {
    let engine = Engine::builder()
        .register_projector(|currency: &Currency, context: &Context| {
            let mut dict = Dict::new();
            dict.insert_str("user_code", Value::str(currency.code));
            dict.insert_str("member", context.get("member").cloned().unwrap_or(Value::None));
            Ok(dict)
        })
        .build();
    let context = Context::from_iter([("member", "alice")]);
    let names = [("ccy", Value::object(Currency { id: 1, code: "EUR" }))];
    let value = engine
        .evaluate_with_options("ccy.member", &names, context, &engine.options().execution)
        .unwrap();
    assert_eq!(value, Value::str("alice"));
}
