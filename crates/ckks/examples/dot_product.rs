// Encrypted dot product of two real vectors using the `fhe-ckks` crate.
//
// The element-wise product is computed with a single multiplication, and the
// slots are then summed with rotations by increasing powers of two.

mod util;

use std::{env, error::Error, process::exit};

use console::style;
use fhe_ckks::ckks::{
    ArithmeticOperator, CkksParametersBuilder, Decryptor, Encoder, Encryptor, GaloisKey,
    KeyGenerator,
};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{distributions::Uniform, prelude::Distribution, thread_rng};
use tracing_subscriber::EnvFilter;
use util::timeit::{timeit, timeit_n};

fn print_notice_and_exit(error: Option<String>) {
    println!(
        "{} Encrypted dot product with CKKS",
        style("  overview:").magenta().bold()
    );
    println!(
        "{} dot_product [-h] [--help] [--size=<value>]",
        style("     usage:").magenta().bold()
    );
    println!(
        "{} {} must be between 1 and 4096",
        style("constraints:").magenta().bold(),
        style("size").blue(),
    );
    if let Some(error) = error {
        println!("{} {}", style("     error:").red().bold(), error);
    }
    exit(0);
}

fn main() -> Result<(), Box<dyn Error>> {
    // Set RUST_LOG=fhe_ckks=trace to follow every homomorphic operation.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.contains(&"-h".to_string()) || args.contains(&"--help".to_string()) {
        print_notice_and_exit(None)
    }

    let mut size = 1000;
    for arg in &args {
        if arg.starts_with("--size") {
            let parts: Vec<&str> = arg.rsplit('=').collect();
            if parts.len() != 2 || parts[0].parse::<usize>().is_err() {
                print_notice_and_exit(Some("Invalid `--size` argument".to_string()))
            } else {
                size = parts[0].parse::<usize>()?
            }
        } else {
            print_notice_and_exit(Some(format!("Unrecognized argument: {arg}")))
        }
    }
    if size == 0 || size > 4096 {
        print_notice_and_exit(Some("The size must be between 1 and 4096".to_string()))
    }

    println!("# Encrypted dot product");
    println!("\tsize = {size}");

    let par = timeit!(
        "Parameters generation",
        CkksParametersBuilder::new()
            .set_degree(8192)
            .set_moduli_sizes(&[60, 40, 40])
            .set_special_moduli_sizes(&[60])
            .set_log_scale(40)
            .build_arc()?
    );

    let mut keygen = KeyGenerator::new(&par);
    let sk = timeit!("Secret key generation", keygen.generate_secret_key(0)?);
    let pk = timeit!("Public key generation", keygen.generate_public_key(&sk)?);
    let rk = timeit!("Relinearization key generation", keygen.generate_relin_key(&sk)?);
    let gk = timeit!("Galois key generation", {
        let mut gk = GaloisKey::with_powers_of_two(&par);
        keygen.generate_galois_key(&sk, &mut gk)?;
        gk
    });

    let dist = Uniform::new_inclusive(-1.0, 1.0);
    let x = dist.sample_iter(thread_rng()).take(size).collect::<Vec<f64>>();
    let y = dist.sample_iter(thread_rng()).take(size).collect::<Vec<f64>>();

    let encoder = Encoder::new(&par);
    let mut encryptor = Encryptor::with_public_key(&pk)?;
    let (x_ct, y_ct) = timeit!("Encryption", {
        let x_ct = encryptor.encrypt(&encoder.encode(&x, par.scale(), 0)?)?;
        let y_ct = encryptor.encrypt(&encoder.encode(&y, par.scale(), 0)?)?;
        (x_ct, y_ct)
    });

    let op = ArithmeticOperator::new(&par);
    let mut acc = timeit!("Multiplication", {
        let mut product = op.multiply(&x_ct, &y_ct)?;
        op.relinearize_inplace(&mut product, &rk)?;
        op.rescale_inplace(&mut product)?;
        product
    });

    let steps = size.next_power_of_two().ilog2();
    let progress = ProgressBar::new(steps as u64).with_style(
        ProgressStyle::with_template("{prefix} [{bar:40.cyan/blue}] {pos}/{len} rotations")?
            .progress_chars("=> "),
    );
    progress.set_prefix("Summing slots");
    timeit!("Rotations and sums", {
        for i in 0..steps {
            let rotated = op.rotate(&acc, 1 << i, &gk)?;
            op.add_inplace(&mut acc, &rotated)?;
            progress.inc(1);
        }
    });
    progress.finish_and_clear();

    let decryptor = Decryptor::new(&sk)?;
    let decrypted = timeit!("Decryption", encoder.decode(&decryptor.decrypt(&acc)?)?);

    let expected = x.iter().zip(&y).map(|(a, b)| a * b).sum::<f64>();
    println!(
        "{} {:.6} (expected {:.6}, error {:.2e})",
        style("result:").green().bold(),
        decrypted[0],
        expected,
        (decrypted[0] - expected).abs()
    );
    println!(
        "{} {} bits",
        style("noise budget:").green().bold(),
        decryptor.noise_budget(&acc)?
    );
    Ok(())
}
