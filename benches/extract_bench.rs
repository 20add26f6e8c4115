use criterion::{black_box, criterion_group, criterion_main, Criterion};
use deckshot::style;

const STYLED: &str = "Create a 10 slide investor update with https://coolors.co/edd3c4-c8adc0-7765e3-3b60e4-080708 and Playfair Display/Source Sans Pro fonts";
const PLAIN: &str = "Create a 10 slide investor update covering revenue, hiring and the product roadmap for next quarter";

fn bench_extract(c: &mut Criterion) {
    // compile the regexes outside the measured loop
    let _ = style::extract(STYLED);

    c.bench_function("extract_styled_prompt", |b| {
        b.iter(|| style::extract(black_box(STYLED)))
    });

    c.bench_function("extract_plain_prompt", |b| {
        b.iter(|| style::extract(black_box(PLAIN)))
    });

    c.bench_function("strip_style_terms", |b| {
        b.iter(|| style::strip_style_terms(black_box(STYLED)))
    });
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
