//! Benchmarks for hoisting inference and copy-on-write evaluation

use compiler::ast::build::*;
use compiler::ast::Node;
use compiler::{Checker, Interpreter};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// A ring of functions where each calls the next, so every signature has to
/// be hoisted before any body can be checked.
fn generate_function_ring(count: usize) -> Vec<Node> {
    (0..count)
        .map(|i| {
            let next = format!("f{}", (i + 1) % count);
            fun_decl(
                &format!("f{}", i),
                func(
                    vec![param("n", ty_nn("Int"))],
                    Some(ty_nn("Int")),
                    vec![if_else(
                        eq(sym("n"), int(0)),
                        vec![int(i as i64)],
                        Some(vec![call(sym(&next), vec![arg(sub(sym("n"), int(1)))])]),
                    )],
                ),
            )
        })
        .collect()
}

/// Many classes declared after their first use.
fn generate_forward_classes(count: usize) -> Vec<Node> {
    let mut forms: Vec<Node> = (0..count)
        .map(|i| {
            let_slot(
                &format!("v{}", i),
                None,
                Some(call(sym(&format!("C{}", i)), vec![arg(int(i as i64))])),
            )
        })
        .collect();
    forms.extend((0..count).map(|i| {
        class(
            &format!("C{}", i),
            vec![
                pub_slot("x", Some(ty_nn("Int")), None),
                fun_decl("double", func(vec![], None, vec![mul(get(self_ref(), "x"), int(2))])),
            ],
        )
    }));
    forms
}

fn nested_object(depth: usize) -> Node {
    (0..depth).fold(int(0), |inner, i| {
        object(vec![("next", inner), ("level", int(i as i64))])
    })
}

/// Repeated assignments through a deep field path.
fn generate_deep_updates(depth: usize, updates: usize) -> Vec<Node> {
    let mut target = sym("root");
    for _ in 0..depth {
        target = select(target, "next");
    }
    let mut forms = vec![let_slot("root", None, Some(nested_object(depth + 1)))];
    forms.extend((0..updates).map(|i| assign(select(target.clone(), "level"), int(i as i64))));
    forms
}

fn benchmark_hoisting(c: &mut Criterion) {
    let mut group = c.benchmark_group("hoisting");

    for size in [10, 50, 200] {
        let ring = generate_function_ring(size);
        group.bench_with_input(BenchmarkId::new("function_ring", size), &ring, |b, forms| {
            b.iter(|| {
                let mut checker = Checker::new();
                black_box(checker.infer_program(forms))
            });
        });

        let classes = generate_forward_classes(size);
        group.bench_with_input(BenchmarkId::new("forward_classes", size), &classes, |b, forms| {
            b.iter(|| {
                let mut checker = Checker::new();
                black_box(checker.infer_program(forms))
            });
        });
    }

    group.finish();
}

fn benchmark_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation");

    let mut recursion = generate_function_ring(4);
    recursion.push(call(sym("f0"), vec![arg(int(200))]));
    group.bench_function("recursive_calls", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new();
            black_box(interp.run(&recursion))
        });
    });

    for depth in [2, 8, 16] {
        let updates = generate_deep_updates(depth, 50);
        group.bench_with_input(BenchmarkId::new("copy_on_write", depth), &updates, |b, forms| {
            b.iter(|| {
                let mut interp = Interpreter::new();
                black_box(interp.run(forms))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_hoisting, benchmark_evaluation);
criterion_main!(benches);
