//! Trains a network on the XOR toy set or on MNIST and reports how it did.
//!
//! ```bash
//! cargo run --release -- xor --optimizer adam --iterations 10000 --seed 7
//! cargo run --release -- mnist --data ./datasets/mnist --samples 2000
//! cargo run --release -- xor --config run.json
//! ```

use std::{path::PathBuf, time::Instant};

use anyhow::{anyhow, bail, Context, Result};
use ffnet::{
    config::{Config, NetworkConfig, TrainingConfig},
    dataset::{self, mnist, xor},
    evaluate,
    layer::{ActivationFunction, ActivationKind},
    losses::LossKind,
    optimizer::{Optimizer, OptimizerConfig},
    Network,
};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const MNIST_ROOT: &str = "./datasets/mnist";
const XOR_SAMPLES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Xor,
    Mnist,
}

#[derive(Debug)]
struct Args {
    task: Task,
    config: Option<PathBuf>,
    optimizer: Option<String>,
    iterations: Option<usize>,
    seed: Option<u64>,
    data: PathBuf,
    samples: usize,
    tanh: bool,
}

fn usage() -> &'static str {
    "usage: mnist_trainer [xor|mnist] [--config FILE] [--optimizer gd|sgd|momentum|sag|adam] \
     [--iterations N] [--seed N] [--data DIR] [--samples N] [--tanh]"
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        task: Task::Xor,
        config: None,
        optimizer: None,
        iterations: None,
        seed: None,
        data: PathBuf::from(MNIST_ROOT),
        samples: 1000,
        tanh: false,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = || {
            it.next()
                .ok_or_else(|| anyhow!("{} needs a value\n{}", arg, usage()))
        };

        match arg.as_str() {
            "xor" => args.task = Task::Xor,
            "mnist" => args.task = Task::Mnist,
            "--config" => args.config = Some(PathBuf::from(value()?)),
            "--optimizer" => args.optimizer = Some(value()?),
            "--iterations" => args.iterations = Some(value()?.parse()?),
            "--seed" => args.seed = Some(value()?.parse()?),
            "--data" => args.data = PathBuf::from(value()?),
            "--samples" => args.samples = value()?.parse()?,
            "--tanh" => args.tanh = true,
            "-h" | "--help" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => bail!("unexpected argument `{}`\n{}", other, usage()),
        }
    }

    Ok(args)
}

/// A network sized for 28x28 digits when no configuration file is given.
fn default_mnist_config() -> Config {
    Config {
        network: NetworkConfig {
            layer_sizes: vec![784, 64, 10],
            activations: vec![ActivationKind::Sigmoid; 2],
            loss: LossKind::Mse,
        },
        training: TrainingConfig {
            optimizer: OptimizerConfig::Sgd {
                learning_rate: 0.5,
                batch_size: 32,
            },
            max_iterations: 5_000,
            ..TrainingConfig::default()
        },
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None if args.task == Task::Mnist => default_mnist_config(),
        None => Config::default(),
    };

    if let Some(name) = &args.optimizer {
        config.training.optimizer = OptimizerConfig::from_name(name)?;
    }
    if let Some(iterations) = args.iterations {
        config.training.max_iterations = iterations;
    }
    if args.seed.is_some() {
        config.training.seed = args.seed;
    }

    Ok(config)
}

fn rng_for(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn build_network(config: &Config, tanh: bool, rng: &mut ChaCha8Rng) -> Result<Network> {
    if !tanh {
        return Ok(config.network.build(rng)?);
    }

    let sigmoid_like = ActivationFunction::custom(
        |x| 0.5 * x.tanh() + 0.5,
        |x| 0.5 / x.cosh().powi(2),
    );
    let activations = vec![sigmoid_like; config.network.layer_sizes.len().saturating_sub(1)];

    Ok(Network::new(
        &config.network.layer_sizes,
        &activations,
        config.network.loss,
        rng,
    )?)
}

fn train(
    network: &mut Network,
    config: &Config,
    inputs: &[Vec<f64>],
    targets: &[Vec<f64>],
) -> Result<()> {
    let mut optimizer = config.training.optimizer.build(config.training.seed)?;

    let start = Instant::now();
    network.train(inputs, targets, &mut optimizer, &config.training.criteria())?;
    let duration = Instant::now() - start;

    println!(
        "{} took {:.3}s, final error {:.6}",
        optimizer.name(),
        duration.as_secs_f32(),
        network.average_error(inputs, targets)?
    );

    Ok(())
}

fn run_xor(args: &Args, config: &Config) -> Result<()> {
    let mut rng = rng_for(config.training.seed);
    let mut network = build_network(config, args.tanh, &mut rng)?;
    let (inputs, targets) = xor::random_samples(XOR_SAMPLES, &mut rng);

    train(&mut network, config, &inputs, &targets)?;

    let (table, expected) = xor::truth_table();
    for x in &table {
        let prediction = network.predict(x)?;
        println!("{} {} {:.4}", x[0], x[1], prediction[0]);
    }
    println!(
        "Max error on the truth table: {:.4}",
        evaluate::max_abs_error(&network, &table, &expected)?
    );

    Ok(())
}

fn run_mnist(args: &Args, config: &Config) -> Result<()> {
    #[cfg(feature = "easy_datasets")]
    mnist::download(&args.data)?;

    let (images, labels) = mnist::MnistReader::in_folder(&args.data, mnist::Split::Train).read()?;
    let count = args.samples.min(images.len());
    let inputs = dataset::normalize_pixels(&images[..count]);
    let targets = dataset::one_hot(&labels[..count], mnist::CLASSES)?;
    info!("Training on {} of {} images", count, images.len());

    let mut rng = rng_for(config.training.seed);
    let mut network = build_network(config, args.tanh, &mut rng)?;
    train(&mut network, config, &inputs, &targets)?;

    println!(
        "Train accuracy: {:.2}%",
        100.0 * evaluate::accuracy(&network, &inputs, &labels[..count])?
    );

    let (test_images, test_labels) =
        mnist::MnistReader::in_folder(&args.data, mnist::Split::Test).read()?;
    let test_inputs = dataset::normalize_pixels(&test_images);
    println!(
        "Test accuracy: {:.2}%",
        100.0 * evaluate::accuracy(&network, &test_inputs, &test_labels)?
    );

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let config = load_config(&args)?;
    info!("Running {:?} with {:?}", args.task, config);

    match args.task {
        Task::Xor => run_xor(&args, &config),
        Task::Mnist => run_mnist(&args, &config),
    }
}
