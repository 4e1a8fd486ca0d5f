use criterion::{criterion_group, criterion_main, Criterion};
use phase::{
    lexer::{self, SUGGESTED_TOKENS_CAPACITY},
    parser,
    report::CollectingReporter,
    token::Token,
};
use std::{hint::black_box, rc::Rc};

static INPUT: &str = include_str!("sample.phs");

fn parse(tokens: &[Token], reporter: &CollectingReporter) {
    let program = parser::parse(tokens, reporter).unwrap();
    _ = black_box(program);
}

fn criterion_benchmark(c: &mut Criterion) {
    let reporter = CollectingReporter::new();
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lexer::scan_into(INPUT, Rc::from("sample.phs"), &reporter, &mut tokens);

    c.bench_function("parser", |b| {
        b.iter(|| parse(black_box(&tokens), &reporter));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
