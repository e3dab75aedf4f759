use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use chrono::{Duration, NaiveDate};
use genua::demo::{default_start_date, generate_cohort};
use genua::models::Observation;
use genua::report::text::TextRenderer;
use genua::report::RenderSink;
use genua::scoring::functional_series;
use genua::{
    assemble_report, compute_insights, derive_history, forecast_discharge, AppConfig, MemoryStore,
    PatientDashboard,
};

// Engine benchmarks over the demo cohort
// Every dashboard view recomputes from the full history, so these track
// the per-interaction cost as histories grow

/// One patient's history stretched to `sessions` check-ins
fn long_history(sessions: usize) -> Vec<Observation> {
    let template = generate_cohort(11, default_start_date()).unwrap_or_default();
    let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap().and_hms_opt(9, 0, 0).unwrap();
    template
        .iter()
        .filter(|o| o.patient.matches("Lucas Oliveira"))
        .cycle()
        .take(sessions)
        .enumerate()
        .map(|(i, o)| Observation {
            timestamp: start + Duration::days(i as i64),
            ..o.clone()
        })
        .collect()
}

fn bench_derive_and_forecast(c: &mut Criterion) {
    let mut group = c.benchmark_group("Derive and forecast");

    for &sessions in &[10, 30, 365, 3650] {
        let history = long_history(sessions);
        group.throughput(Throughput::Elements(sessions as u64));
        group.bench_with_input(
            BenchmarkId::new("derive_forecast_insights", sessions),
            &history,
            |b, history| {
                b.iter(|| {
                    let derived = derive_history(black_box(history));
                    let projection =
                        forecast_discharge(&functional_series(&derived), default_start_date());
                    let insights = compute_insights(&derived);
                    black_box((projection, insights))
                });
            },
        );
    }

    group.finish();
}

fn bench_dashboard_load(c: &mut Criterion) {
    let mut store = MemoryStore::new();
    genua::demo::seed_store(&mut store, 42, default_start_date()).unwrap();
    let config = AppConfig::default();

    c.bench_function("dashboard_load_demo_patient", |b| {
        b.iter(|| PatientDashboard::load(&store, black_box("Roberto Santos"), &config).unwrap());
    });
}

fn bench_report(c: &mut Criterion) {
    let mut store = MemoryStore::new();
    genua::demo::seed_store(&mut store, 42, default_start_date()).unwrap();
    let dashboard =
        PatientDashboard::load(&store, "Lucas Oliveira", &AppConfig::default()).unwrap();
    let context = dashboard.context();

    c.bench_function("assemble_and_render_text_report", |b| {
        b.iter(|| {
            let document = assemble_report(
                &context,
                &dashboard.history,
                &dashboard.insights,
                &dashboard.projection,
                None,
            );
            let mut renderer = TextRenderer::new(Vec::new());
            renderer.render(&document, &[]).unwrap();
            black_box(renderer.into_inner())
        });
    });
}

criterion_group!(benches, bench_derive_and_forecast, bench_dashboard_load, bench_report);
criterion_main!(benches);
