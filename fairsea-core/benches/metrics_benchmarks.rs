use criterion::{Criterion, black_box, criterion_group, criterion_main};
use fairsea_core::metrics::{
    ContingencyTable, Factor, FactorialDesign, dbi, factorial_anova, fdi, jsd,
};

const GENDERS: [&str; 2] = ["Female", "Male"];
const RACES: [&str; 4] = ["Chinese", "Malay", "Indian", "Others"];
const NATIONALITIES: [&str; 2] = ["Singaporean", "Malaysian"];
const LABELS: [&str; 5] = ["a", "b", "c", "d", "e"];

fn observations(n: usize) -> Vec<(String, String)> {
    (0..n)
        .map(|i| {
            let group = format!("{}_{}", GENDERS[i % 2], RACES[(i / 2) % 4]);
            let label = LABELS[(i * 7 + i / 3) % 5].to_string();
            (group, label)
        })
        .collect()
}

fn bench_indices(c: &mut Criterion) {
    let obs = observations(10_000);
    c.bench_function("contingency + chi2 on 10k rows", |b| {
        b.iter(|| {
            let table = ContingencyTable::from_observations(black_box(obs.clone()));
            table.chi_square(true)
        })
    });

    let proportions = ContingencyTable::from_observations(obs)
        .normalized()
        .unwrap();
    c.bench_function("fdi + jsd on 8x5 table", |b| {
        b.iter(|| (fdi(black_box(&proportions)), jsd(black_box(&proportions))))
    });

    let scores: Vec<(String, f64)> = (0..10_000)
        .map(|i| (GENDERS[i % 2].to_string(), ((i * 31) % 97) as f64 / 97.0))
        .collect();
    c.bench_function("dbi on 10k scores", |b| b.iter(|| dbi(black_box(&scores))));
}

fn bench_anova(c: &mut Criterion) {
    let n = 960;
    let gender: Vec<&str> = (0..n).map(|i| GENDERS[i % 2]).collect();
    let race: Vec<&str> = (0..n).map(|i| RACES[(i / 2) % 4]).collect();
    let nationality: Vec<&str> = (0..n).map(|i| NATIONALITIES[(i / 8) % 2]).collect();
    let y: Vec<f64> = (0..n).map(|i| ((i * 13) % 29) as f64 / 29.0).collect();
    let design = FactorialDesign::new(vec![
        Factor::new("Gender", &gender),
        Factor::new("Race", &race),
        Factor::new("Nationality", &nationality),
    ])
    .unwrap();

    c.bench_function("three-way factorial anova, 960 rows", |b| {
        b.iter(|| factorial_anova(black_box(&design), black_box(&y)))
    });
}

criterion_group!(benches, bench_indices, bench_anova);
criterion_main!(benches);
