use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use i94_processor::models::{ImmigrationRecord, PortDim, TemperatureObservation};
use i94_processor::processors::staging::clean_immigration;
use i94_processor::processors::{assemble_visits, drop_duplicates};
use i94_processor::readers::reference_reader::parse_entries;
use std::collections::HashSet;
use std::path::Path;

const PORTS: &[(&str, &str, &str, &str)] = &[
    ("NYC", "NEW YORK", "NY", "NEW YORK"),
    ("LOS", "LOS ANGELES", "CA", "CALIFORNIA"),
    ("SFR", "SAN FRANCISCO", "CA", "CALIFORNIA"),
    ("MIA", "MIAMI", "FL", "FLORIDA"),
    ("CHI", "CHICAGO", "IL", "ILLINOIS"),
];

// Synthetic April 2016 arrivals spread over the ports above
fn create_test_data(
    record_count: usize,
) -> (Vec<ImmigrationRecord>, Vec<PortDim>, Vec<TemperatureObservation>) {
    let ports: Vec<PortDim> = PORTS
        .iter()
        .map(|&(code, city, state, name)| PortDim::new(code, city, state, name))
        .collect();

    let mut temperatures = Vec::new();
    for port in &ports {
        for day in 1..=30 {
            temperatures.push(TemperatureObservation::new(
                "US",
                port.state_name.as_str(),
                port.city.as_str(),
                2016,
                4,
                day,
                Some(50.0 + day as f64 * 0.5),
            ));
        }
    }

    let records = (0..record_count)
        .map(|i| {
            let mut record = ImmigrationRecord::new(i as i64);
            let arrdate = 20545 + (i % 30) as i64;
            record.i94port = Some(PORTS[i % PORTS.len()].0.to_string());
            record.arrdate = Some(arrdate);
            record.depdate = Some(arrdate + (i % 14) as i64);
            record.i94mode = Some(1);
            record.matflag = Some("M".to_string());
            record
        })
        .collect();

    (records, ports, temperatures)
}

fn create_reference_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("   {i} =  'COUNTRY NUMBER {i}'\n"))
        .collect()
}

fn benchmark_reference_parsing(c: &mut Criterion) {
    let text = create_reference_text(300);
    let path = Path::new("I94-country-codes.txt");

    c.bench_function("parse_reference_entries", |b| {
        b.iter(|| {
            let entries = parse_entries(black_box(&text), path).unwrap();
            black_box(entries.len())
        })
    });
}

fn benchmark_staging_cleanse(c: &mut Criterion) {
    let (mut records, _, _) = create_test_data(10_000);
    // Every tenth row repeated
    let repeats: Vec<ImmigrationRecord> = records.iter().step_by(10).cloned().collect();
    records.extend(repeats);
    let known_ports: HashSet<String> = PORTS.iter().map(|p| p.0.to_string()).collect();

    c.bench_function("drop_duplicates", |b| {
        b.iter(|| {
            let (unique, removed) = drop_duplicates(black_box(records.clone()));
            black_box((unique.len(), removed))
        })
    });

    c.bench_function("clean_immigration", |b| {
        b.iter(|| {
            let (cleaned, stats) = clean_immigration(black_box(records.clone()), &known_ports);
            black_box((cleaned.len(), stats.written))
        })
    });
}

fn benchmark_fact_assembly_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("fact_assembly_by_size");

    for &size in &[1_000, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::new("records", size), &size, |b, &size| {
            let (records, ports, temperatures) = create_test_data(size);
            b.iter(|| {
                let output = assemble_visits(&records, &ports, &temperatures, 4).unwrap();
                black_box(output.visits.len())
            })
        });
    }

    group.finish();
}

fn benchmark_worker_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("fact_assembly_by_workers");
    let (records, ports, temperatures) = create_test_data(50_000);

    for &workers in &[1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter(|| {
                let output = assemble_visits(&records, &ports, &temperatures, workers).unwrap();
                black_box(output.attrition.after_temperature_join)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reference_parsing,
    benchmark_staging_cleanse,
    benchmark_fact_assembly_by_size,
    benchmark_worker_counts
);
criterion_main!(benches);
