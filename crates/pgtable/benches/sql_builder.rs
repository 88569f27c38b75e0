use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgtable::{Filter, PredicateInput, QueryBuilder, Sql, normalize};

/// SELECT col0, col1, ... FROM t WHERE col0 = $1 AND col1 = $2 ...
fn build_select_sql(n: usize) -> Sql {
    let mut sql = Sql::new("SELECT ");
    for i in 0..n {
        if i > 0 {
            sql.push(", ");
        }
        sql.push(&format!("col{i}"));
    }
    sql.push(" FROM t WHERE ");
    for i in 0..n {
        if i > 0 {
            sql.push(" AND ");
        }
        sql.push(&format!("col{i} = "));
        sql.push_bind(i as i64);
    }
    sql
}

fn bench_to_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/to_sql");

    for n in [1, 5, 10, 50, 100] {
        let sql = build_select_sql(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &sql, |b, sql| {
            b.iter(|| black_box(sql.to_sql()));
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/normalize");

    let inputs = [
        ("keyword", PredicateInput::keyword("id", 7)),
        ("triple", PredicateInput::from(("value1", "not contains", "abc"))),
        ("text", PredicateInput::from("timestamp between '2020-01-01' and '2021-01-01'")),
    ];
    for (name, input) in &inputs {
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| black_box(normalize(input, None).map(|p| p.to_sql(None).to_sql())));
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/render");

    for n in [1, 5, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let filter = (0..n).fold(Filter::new(), |f, i| f.eq(format!("col{i}"), i as i64));
                let rendered = QueryBuilder::new("t")
                    .primary("id")
                    .add_where_statements(filter)
                    .limit(10)
                    .render()
                    .map(|(sql, _)| sql.to_sql());
                black_box(rendered)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_to_sql, bench_normalize, bench_render);
criterion_main!(benches);
