use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fhe_ckks::ckks::{
    ArithmeticOperator, Bootstrapper, BootstrappingConfig, BootstrappingKeys,
    CkksParametersBuilder, Decryptor, Encoder, Encryptor, GaloisKey, KeyGenerator,
    KeySwitchMethod, SecurityLevel,
};
use std::time::Duration;

pub fn ckks_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("ckks");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));

    for (method, special) in [
        (KeySwitchMethod::II, vec![50]),
        (KeySwitchMethod::III, vec![40, 40]),
    ] {
        let par = CkksParametersBuilder::new()
            .set_degree(8192)
            .set_moduli_sizes(&[50, 40, 40])
            .set_special_moduli_sizes(&special)
            .set_log_scale(40)
            .set_keyswitch_method(method)
            .build_arc()
            .unwrap();
        let name = format!("{method:?}");

        let mut keygen = KeyGenerator::new(&par);
        let sk = keygen.generate_secret_key(0).unwrap();
        let rk = keygen.generate_relin_key(&sk).unwrap();
        let mut gk = GaloisKey::with_steps(&par, &[1]);
        keygen.generate_galois_key(&sk, &mut gk).unwrap();

        let encoder = Encoder::new(&par);
        let values = (0..par.slots())
            .map(|i| (i as f64).sin())
            .collect::<Vec<_>>();
        let pt = encoder.encode(&values, par.scale(), 0).unwrap();
        let mut encryptor = Encryptor::with_secret_key(&sk).unwrap();
        let ct = encryptor.encrypt(&pt).unwrap();
        let decryptor = Decryptor::new(&sk).unwrap();
        let op = ArithmeticOperator::new(&par);

        if method == KeySwitchMethod::II {
            group.bench_function("encode", |b| {
                b.iter(|| encoder.encode(&values, par.scale(), 0).unwrap());
            });
            group.bench_function("encrypt", |b| {
                b.iter(|| encryptor.encrypt(&pt).unwrap());
            });
            group.bench_function("decrypt", |b| {
                b.iter(|| decryptor.decrypt(&ct).unwrap());
            });
            group.bench_function("add", |b| {
                b.iter(|| op.add(&ct, &ct).unwrap());
            });
            group.bench_function("multiply", |b| {
                b.iter(|| op.multiply(&ct, &ct).unwrap());
            });
            let product = op
                .relinearize(&op.multiply(&ct, &ct).unwrap(), &rk)
                .unwrap();
            group.bench_function("rescale", |b| {
                b.iter(|| op.rescale(&product).unwrap());
            });
        }

        let product = op.multiply(&ct, &ct).unwrap();
        group.bench_function(BenchmarkId::new("relinearize", &name), |b| {
            b.iter(|| op.relinearize(&product, &rk).unwrap());
        });
        group.bench_function(BenchmarkId::new("rotate", &name), |b| {
            b.iter(|| op.rotate(&ct, 1, &gk).unwrap());
        });
    }

    let mut sizes = vec![50];
    sizes.extend([40; 24]);
    let par = CkksParametersBuilder::new()
        .set_degree(64)
        .set_moduli_sizes(&sizes)
        .set_special_moduli_sizes(&[60])
        .set_log_scale(40)
        .set_security_level(SecurityLevel::None)
        .build_arc()
        .unwrap();
    let mut bootstrapper =
        Bootstrapper::new(&par, BootstrappingConfig::new(2, 2, 11, false).unwrap());
    bootstrapper.generate_bootstrapping_params(par.scale()).unwrap();
    let mut keygen = KeyGenerator::new(&par);
    let sk = keygen.generate_secret_key(16).unwrap();
    let rk = keygen.generate_relin_key(&sk).unwrap();
    let mut gk = GaloisKey::new(&par, bootstrapper.rotation_set().unwrap());
    keygen.generate_galois_key(&sk, &mut gk).unwrap();
    let keys = BootstrappingKeys::new(&rk, &gk, &gk);

    let pt = Encoder::new(&par)
        .encode(&[0.5, -0.25], par.scale(), par.max_level())
        .unwrap();
    let ct = Encryptor::with_secret_key(&sk).unwrap().encrypt(&pt).unwrap();
    group.bench_function(BenchmarkId::new("bootstrapping", par.degree()), |b| {
        b.iter(|| bootstrapper.bootstrapping(&ct, &keys).unwrap());
    });

    group.finish();
}

criterion_group!(ckks, ckks_benchmark);
criterion_main!(ckks);
