use super::*;
use crate::schema::ColumnSchema;

fn render(input: impl Into<PredicateInput>) -> (String, Vec<Value>) {
    let pred = normalize(&input.into(), None).unwrap();
    let sql = pred.to_sql(None);
    (sql.to_sql(), sql.params().to_vec())
}

fn items() -> TableSchema {
    TableSchema::new(
        "items",
        vec![
            ColumnSchema::new("id", "integer").primary(),
            ColumnSchema::new("name", "text"),
            ColumnSchema::new("active", "boolean"),
        ],
    )
}

#[test]
fn test_three_notations_are_identical() {
    let keyword = normalize(&PredicateInput::keyword("id", 4), None).unwrap();
    let triple = normalize(&("id", "=", 4).into(), None).unwrap();
    let text = normalize(&"id = 4".into(), None).unwrap();

    assert_eq!(keyword, triple);
    assert_eq!(triple, text);
    assert_eq!(keyword.to_sql(None), text.to_sql(None));
    assert_eq!(text.to_sql(None).to_sql(), r#"("id" = $1)"#);
    assert_eq!(text.to_sql(None).params(), &[Value::Int(4)]);
}

#[test]
fn test_qualified_column() {
    let pred = normalize(&"id >= 4".into(), None).unwrap();
    let table = Ident::parse("items").unwrap();
    assert_eq!(pred.to_sql(Some(&table)).to_sql(), r#"("items"."id" >= $1)"#);
}

#[test]
fn test_comparison_operators() {
    assert_eq!(render(("id", ">", 0)).0, r#"("id" > $1)"#);
    assert_eq!(render(("id", "<", 0)).0, r#"("id" < $1)"#);
    assert_eq!(render(("id", "<=", 0)).0, r#"("id" <= $1)"#);
    assert_eq!(render(("id", "<>", 0)).0, r#"("id" <> $1)"#);
}

#[test]
fn test_bang_equal_and_not_translate_to_ne() {
    assert_eq!(render(("id", "!=", 1)).0, r#"("id" <> $1)"#);
    assert_eq!(render(("id", "not", 1)).0, r#"("id" <> $1)"#);
    assert_eq!(render("id != 1").0, r#"("id" <> $1)"#);
}

#[test]
fn test_between_renders_pair() {
    let (sql, params) = render(PredicateInput::range("id", "between", 1, 5));
    assert_eq!(sql, r#"("id" BETWEEN $1 AND $2)"#);
    assert_eq!(params, vec![Value::Int(1), Value::Int(5)]);

    assert_eq!(render("id not between 1 and 5"), (
        r#"("id" NOT BETWEEN $1 AND $2)"#.to_string(),
        vec![Value::Int(1), Value::Int(5)],
    ));
}

#[test]
fn test_contains_wraps_wildcards() {
    let (sql, params) = render(("name", "contains", "bob"));
    assert_eq!(sql, r#"("name"::text LIKE $1)"#);
    assert_eq!(params, vec![Value::from("%bob%")]);

    let (sql, params) = render("name not contains bob");
    assert_eq!(sql, r#"("name"::text NOT LIKE $1)"#);
    assert_eq!(params, vec![Value::from("%bob%")]);
}

#[test]
fn test_contains_escapes_metacharacters() {
    let (_, params) = render(("code", "contains", "50%_off"));
    assert_eq!(params, vec![Value::from("%50\\%\\_off%")]);
}

#[test]
fn test_contains_number_matches_text_form() {
    let (sql, params) = render("identifier contains 1");
    assert_eq!(sql, r#"("identifier"::text LIKE $1)"#);
    assert_eq!(params, vec![Value::from("%1%")]);
}

#[test]
fn test_like_binds_pattern_verbatim() {
    let (sql, params) = render(("name", "like", "b_b%"));
    assert_eq!(sql, r#"("name"::text LIKE $1)"#);
    assert_eq!(params, vec![Value::from("b_b%")]);

    assert_eq!(render("name not like b%").0, r#"("name"::text NOT LIKE $1)"#);
}

#[test]
fn test_in_reverses_operands() {
    let (sql, params) = render(("name", "in", "alice,bob"));
    assert_eq!(sql, r#"($1 LIKE ('%' || "name"::text || '%'))"#);
    assert_eq!(params, vec![Value::from("alice,bob")]);

    let (sql, _) = render("name not in alice,bob");
    assert_eq!(sql, r#"($1 NOT LIKE ('%' || "name"::text || '%'))"#);
}

#[test]
fn test_null_values() {
    assert_eq!(render(("deleted_at", "=", Value::Null)), (
        r#"("deleted_at" IS NULL)"#.to_string(),
        vec![],
    ));
    assert_eq!(render("deleted_at is null").0, r#"("deleted_at" IS NULL)"#);
    assert_eq!(render("deleted_at != NULL").0, r#"("deleted_at" IS NOT NULL)"#);
    assert_eq!(render("deleted_at is not None").0, r#"("deleted_at" IS NOT NULL)"#);
    assert_eq!(render(("score", "<", Value::Null)).0, r#"("score" < NULL)"#);
}

#[test]
fn test_is_with_booleans_and_values() {
    assert_eq!(render("active is true").0, r#"("active" IS TRUE)"#);
    assert_eq!(render("active is not false").0, r#"("active" IS NOT FALSE)"#);

    let (sql, params) = render(("n", "is", 3));
    assert_eq!(sql, r#"("n" IS NOT DISTINCT FROM $1)"#);
    assert_eq!(params, vec![Value::Int(3)]);
    assert_eq!(render(("n", "is not", 3)).0, r#"("n" IS DISTINCT FROM $1)"#);
}

#[test]
fn test_text_literals() {
    assert_eq!(render("id = -3").1, vec![Value::Int(-3)]);
    assert_eq!(render("price > 2.5").1, vec![Value::Float(2.5)]);
    assert_eq!(render("name = 'bob smith'").1, vec![Value::from("bob smith")]);
    assert_eq!(render("name = '42'").1, vec![Value::from("42")]);
    assert_eq!(render("name = \"it's\"").1, vec![Value::from("it's")]);
    assert_eq!(render("name = 'it''s'").1, vec![Value::from("it's")]);
}

#[test]
fn test_non_canonical_numbers_keep_their_text() {
    for token in ["01234", "1.10", "1e3", "+5"] {
        let text = render(format!("value1 = {token}").as_str());
        let triple = render(("value1", "=", token));
        assert_eq!(text, triple, "token {token}");
        assert_eq!(text.1, vec![Value::from(token)]);
    }
    assert_eq!(render("value1 contains 1.10").1, vec![Value::from("%1.10%")]);
}

#[test]
fn test_text_column_keeps_unquoted_tokens_as_text() {
    let schema = items();
    let text = normalize(&"name = 1234".into(), Some(&schema)).unwrap();
    let triple = normalize(&("name", "=", "1234").into(), Some(&schema)).unwrap();
    assert_eq!(text, triple);
    assert_eq!(text.to_sql(None).params(), &[Value::from("1234")]);

    let text = normalize(&"name = null".into(), Some(&schema)).unwrap();
    assert_eq!(text.to_sql(None).to_sql(), r#"("name" IS NULL)"#);

    let typed = normalize(&"id = 1234".into(), Some(&schema)).unwrap();
    assert_eq!(typed.to_sql(None).params(), &[Value::Int(1234)]);
}

#[test]
fn test_operator_parse_is_case_insensitive() {
    assert_eq!(Operator::parse("IS   NOT").unwrap(), Operator::IsNot);
    assert_eq!("Not Contains".parse::<Operator>().unwrap(), Operator::NotContains);
    assert_eq!(render("id BETWEEN 1 AND 2").0, r#"("id" BETWEEN $1 AND $2)"#);
    for op in ALLOWED_OPERATORS {
        assert_eq!(Operator::parse(op).unwrap().as_str(), *op);
    }
}

#[test]
fn test_unsupported_operator_names_allowed_set() {
    let err = normalize(&("id", "~=", 1).into(), None).unwrap_err();
    match err {
        TableError::UnsupportedOperator { operator, allowed } => {
            assert_eq!(operator, "~=");
            assert_eq!(allowed.len(), 18);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(normalize(&"id ~= 1".into(), None).is_err());
}

#[test]
fn test_malformed_arity() {
    let two = PredicateInput::Triple(vec![Operand::from("id"), Operand::from("=")]);
    assert!(matches!(
        normalize(&two, None),
        Err(TableError::MalformedPredicate(_))
    ));
    assert!(matches!(
        normalize(&"id =".into(), None),
        Err(TableError::MalformedPredicate(_))
    ));
    assert!(matches!(
        normalize(&"id = 1 2".into(), None),
        Err(TableError::MalformedPredicate(_))
    ));
    assert!(matches!(
        normalize(&"id between 1".into(), None),
        Err(TableError::MalformedPredicate(_))
    ));
    assert!(matches!(
        normalize(&"name = 'open".into(), None),
        Err(TableError::MalformedPredicate(_))
    ));
}

#[test]
fn test_operand_shape_checked() {
    assert!(matches!(
        normalize(&("id", "between", 1).into(), None),
        Err(TableError::MalformedPredicate(_))
    ));
    assert!(matches!(
        normalize(&PredicateInput::range("id", "=", 1, 2), None),
        Err(TableError::MalformedPredicate(_))
    ));
}

#[test]
fn test_unknown_column_against_schema() {
    let schema = items();
    let err = normalize(&"nope = 1".into(), Some(&schema)).unwrap_err();
    match err {
        TableError::UnknownColumn {
            column,
            table,
            available,
        } => {
            assert_eq!(column, "nope");
            assert_eq!(table, "items");
            assert_eq!(available, ["id", "name", "active"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(normalize(&PredicateInput::keyword("id", 1), Some(&schema)).is_ok());
}

#[test]
fn test_value_contains_column_is_reversed() {
    let schema = items();
    let pred = normalize(&"bob contains name".into(), Some(&schema)).unwrap();
    assert_eq!(pred.column().name(), "name");
    assert_eq!(pred.to_sql(None).params(), &[Value::from("%bob%")]);

    let pred = normalize(&"bob not contains name".into(), Some(&schema)).unwrap();
    assert_eq!(pred.operator(), Operator::NotContains);
    assert_eq!(pred.column().name(), "name");

    // a known column on the left keeps the natural order
    let pred = normalize(&"name contains id".into(), Some(&schema)).unwrap();
    assert_eq!(pred.column().name(), "name");
}

#[test]
fn test_filter_single_equality() {
    let filter = Filter::new().eq("id", 1);
    assert_eq!(filter.single_equality(), Some(("id", &Value::Int(1))));

    let filter = filter.and("name = bob");
    assert_eq!(filter.len(), 2);
    assert!(filter.single_equality().is_none());

    let preds = normalize_all(&filter, None).unwrap();
    assert_eq!(preds.len(), 2);
    assert!(Filter::new().is_empty());
}
