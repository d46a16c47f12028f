use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use radial_grf::{
    CholeskyFactorizer, CovarianceModel, RadialKernel, RadiusGrid, SamplingPlan, SpectrumModel,
};

fn model() -> CovarianceModel<SpectrumModel> {
    CovarianceModel::new(SpectrumModel::default(), RadialKernel::Spherical, 10.0).expect("model")
}

fn bench_sampling_pipeline(c: &mut Criterion) {
    let grid_small = RadiusGrid::linear_ramp(16, 10.0).expect("grid");
    let grid_medium = RadiusGrid::linear_ramp(32, 30.0).expect("grid");
    let model = model();

    let mut group = c.benchmark_group("sampling_pipeline");

    group.bench_function("covariance_16", |b| {
        b.iter(|| {
            let cov = model.build(&grid_small).expect("covariance");
            black_box(cov);
        });
    });

    group.bench_function("cholesky_32", |b| {
        let cov = model.build(&grid_medium).expect("covariance");
        b.iter(|| {
            let factor = CholeskyFactorizer::factor(&cov).expect("factor");
            black_box(factor);
        });
    });

    group.bench_function("draw_32", |b| {
        let plan = SamplingPlan::build(&grid_medium, &model, 2.0).expect("plan");
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        b.iter(|| {
            let sample = plan.draw(&mut rng).expect("sample");
            black_box(sample);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sampling_pipeline);
criterion_main!(benches);
