use criterion::{criterion_group, criterion_main, Criterion};
use phase::{
    lexer::{self, SUGGESTED_TOKENS_CAPACITY},
    report::CollectingReporter,
};
use std::{hint::black_box, rc::Rc};

static INPUT: &str = include_str!("sample.phs");

fn criterion_benchmark(c: &mut Criterion) {
    let file: Rc<str> = "sample.phs".into();
    let reporter = CollectingReporter::new();
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);

    c.bench_function("lexer", |b| {
        b.iter(|| {
            tokens.clear();
            lexer::scan_into(black_box(INPUT), Rc::clone(&file), &reporter, &mut tokens);
            black_box(tokens.len());
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
