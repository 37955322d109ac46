use bigdecimal::BigDecimal;
use common_money::{cart_total, normalize_scale, LineItem};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::str::FromStr;

fn bench_normalize(c: &mut Criterion) {
    let samples: Vec<BigDecimal> = ["1.005", "2.675", "0.005", "-1.005", "-2.505", "12345", "1000000.555", "0.3349"]
        .into_iter()
        .map(|s| BigDecimal::from_str(s).unwrap())
        .collect();
    c.bench_function("normalize_scale", |b| {
        b.iter(|| {
            for v in &samples {
                black_box(normalize_scale(v));
            }
        });
    });
}

fn bench_cart_total(c: &mut Criterion) {
    let lines: Vec<LineItem> = (0..200)
        .map(|i| LineItem {
            price: BigDecimal::from_str(&format!("{}.{:02}", i, i % 100)).unwrap(),
            discount_pct: if i % 3 == 0 { Some(BigDecimal::from(i % 40)) } else { None },
            quantity: (i % 7) as u32 + 1,
        })
        .collect();
    c.bench_function("cart_total_200_lines", |b| b.iter(|| black_box(cart_total(&lines))));
}

criterion_group!(benches, bench_normalize, bench_cart_total);
criterion_main!(benches);
