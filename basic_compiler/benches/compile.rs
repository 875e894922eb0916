use criterion::{black_box, criterion_group, criterion_main, Criterion};

use basic_compiler::prelude::*;

fn criterion_benchmark(c: &mut Criterion) {
    let sample = include_str!("../../programs/sample.bas");

    c.bench_function("sample front end", |b| {
        b.iter(|| black_box(parse_str(black_box(sample))))
    });

    c.bench_function("sample compile", |b| {
        b.iter(|| black_box(compile_str(black_box(sample))))
    });

    {
        // Long straight line program with nested loops every few lines.
        let mut source = String::new();
        for i in 0..500 {
            let line = (i + 1) * 10;
            match i % 5 {
                0 => source.push_str(&format!("{line} FOR I{i} = 1 TO 10\n")),
                4 => source.push_str(&format!("{line} END\n")),
                _ => source.push_str(&format!("{line} LET X{i} = {i} * 2 + 3 ^ 2\n")),
            }
        }

        c.bench_function("generated compile", |b| {
            b.iter(|| black_box(compile_str(black_box(&source))))
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
