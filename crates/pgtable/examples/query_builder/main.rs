//! Query builder rendering; no database needed.
//!
//! Run with: cargo run --example query_builder -p pgtable

use pgtable::{JoinKind, PredicateInput, QueryBuilder, TableResult};

fn show(title: &str, qb: QueryBuilder) -> TableResult<()> {
    let (sql, _) = qb.render()?;
    println!("=== {title} ===");
    println!("{}", sql.to_sql());
    println!("params: {:?}\n", sql.params());
    Ok(())
}

fn main() -> TableResult<()> {
    show(
        "select",
        QueryBuilder::new("orders")
            .primary("id")
            .add_desired_columns(["id", "total"])
            .add_where_statements(("total", ">", 100))
            .add_where_statements("status not in 'cancelled,refunded'")
            .limit(10)
            .offset(20),
    )?;

    show(
        "join",
        QueryBuilder::new("orders")
            .add_desired_columns(["id"])
            .add_desired_columns_of_foreign_table("customers", ["name"])
            .add_join(JoinKind::Left, "customers", "customer_id", "id")
            .order_foreign("customers", "name", true),
    )?;

    show(
        "count distinct",
        QueryBuilder::new("orders")
            .add_desired_columns(["customer_id"])
            .length_request(true),
    )?;

    show(
        "insert",
        QueryBuilder::new("orders")
            .add_new_values([("id", 7), ("total", 250)])
            .add_default_value("created_at"),
    )?;

    show(
        "update",
        QueryBuilder::new("orders")
            .add_new_value("status", "shipped")
            .add_where_eq("id", 7),
    )?;

    show(
        "delete",
        QueryBuilder::new("orders")
            .add_where_statements(PredicateInput::range(
                "created_at",
                "between",
                "2020-01-01",
                "2020-12-31",
            ))
            .delete_request(),
    )?;

    show("truncate", QueryBuilder::new("orders").delete_request())?;

    Ok(())
}
