use std::path::Path;

use anyhow::{Context, Result};
use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;
use burn::tensor::Distribution;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use pspnet_segmentation::data::{train_transform, SegSample};
use pspnet_segmentation::training::{sgd_trainer, TrainingConfig};

type MyBackend = NdArray;
type MyAutodiffBackend = Autodiff<MyBackend>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Training configuration (created with defaults when missing)
    #[arg(short, long, default_value = "configs/pspnet.yaml")]
    config: String,

    /// RGB image to augment into the batch instead of random data
    #[arg(short, long, requires = "label")]
    image: Option<String>,

    /// Label map matching --image
    #[arg(short, long, requires = "image")]
    label: Option<String>,

    /// Number of optimisation steps
    #[arg(long, default_value_t = 1)]
    steps: usize,

    /// Seed for the augmentation generator
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn load_config(path: &str) -> Result<TrainingConfig> {
    if Path::new(path).exists() {
        println!("Loading config from {path}");
        return TrainingConfig::from_yaml(path);
    }

    let config = TrainingConfig::default();
    if let Some(dir) = Path::new(path).parent() {
        std::fs::create_dir_all(dir)?;
    }
    config.save(path)?;
    println!("Created default config at {path}");
    Ok(config)
}

/// A batch built by augmenting one image/label pair `batch_size` times.
fn augmented_batch(
    config: &TrainingConfig,
    image: &str,
    label: &str,
    seed: u64,
    device: &<MyAutodiffBackend as Backend>::Device,
) -> Result<(Tensor<MyAutodiffBackend, 4>, Tensor<MyAutodiffBackend, 3, Int>)> {
    let rgb = image::open(image)
        .with_context(|| format!("opening image {image}"))?
        .to_rgb8();
    let gray = image::open(label)
        .with_context(|| format!("opening label {label}"))?
        .to_luma8();
    let sample = SegSample::from_rgb8(&rgb, gray)?;

    let transform = train_transform(&config.augmentation, config.ignore_label())?
        .with_label_size(config.label_size()?);
    let mut rng = StdRng::seed_from_u64(seed);

    Ok(transform.batch::<MyAutodiffBackend>(&sample, config.batch_size, &mut rng, device))
}

fn random_batch(
    config: &TrainingConfig,
    device: &<MyAutodiffBackend as Backend>::Device,
) -> Result<(Tensor<MyAutodiffBackend, 4>, Tensor<MyAutodiffBackend, 3, Int>)> {
    let n = config.batch_size;
    let (h, w) = (
        config.augmentation.train_h as usize,
        config.augmentation.train_w as usize,
    );
    let [label_h, label_w] = config.label_size()?;
    let classes = config.model.num_classes() as f64;

    Ok((
        Tensor::random([n, 3, h, w], Distribution::Normal(0.0, 1.0), device),
        Tensor::random([n, label_h, label_w], Distribution::Uniform(0.0, classes), device),
    ))
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    println!("PSPNet Training Step (CPU)");
    println!("==========================\n");

    let config = load_config(&args.config)?;
    println!("  Classes       : {}", config.model.num_classes());
    println!("  Base LR       : {}", config.base_lr);
    println!("  Momentum      : {}", config.momentum);
    println!("  Weight decay  : {}", config.weight_decay);
    println!(
        "  Crop          : {}x{}",
        config.augmentation.train_h, config.augmentation.train_w
    );
    println!();

    let device = Default::default();

    let mut model = config.model.init::<MyAutodiffBackend>(&device)?;
    if let Some(weights) = &config.pretrained_weights {
        model = model.load_backbone(weights, &device)?;
    }

    let mut trainer = sgd_trainer(model, &config);

    let (images, labels) = match (&args.image, &args.label) {
        (Some(image), Some(label)) => augmented_batch(&config, image, label, args.seed, &device)?,
        _ => random_batch(&config, &device)?,
    };
    println!("Batch images {:?}, labels {:?}\n", images.dims(), labels.dims());

    for step in 0..args.steps {
        let lr = trainer.schedule(step);
        let losses = trainer.train_step(images.clone(), labels.clone())?;
        println!(
            "step {:<4} lr {:<10.3e} main {:<10.5} aux {:<10} total {:.5}",
            step,
            lr,
            losses.main_loss,
            losses
                .aux_loss
                .map(|aux| format!("{aux:.5}"))
                .unwrap_or_else(|| "-".to_string()),
            losses.total
        );
    }
    println!("\nGroups: {}", trainer.groups());

    let output = trainer.validate_step(images.inner(), Some(labels.inner()))?;
    println!("Logits {:?}, prediction {:?}", output.logits.dims(), output.yhat.dims());
    if let Some(loss) = output.main_loss {
        println!("Validation loss {:.5}", loss.into_scalar().elem::<f32>());
    }

    Ok(())
}
