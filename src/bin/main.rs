use std::{path::PathBuf, process};

use anyhow::Context;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use structopt::StructOpt;
use tracing_subscriber::*;
use xaynet_datasim::{
    attack::PoisonedSource,
    loader::{DatasetLoader, SyntheticLoader},
    partition::{partition, PartitionStats},
    root::{select_root, RootSetParams},
    settings::{AttackSettings, PartitionSettings, RootSettings, Settings},
    source::{label_histogram, IndexSet, InMemorySource, SampleSource, Share},
};

#[macro_use]
extern crate tracing;

#[derive(Debug, StructOpt)]
#[structopt(name = "Datasim")]
struct Opt {
    /// Path of the configuration file
    #[structopt(short, parse(from_os_str))]
    config_path: PathBuf,
}

fn main() {
    let opt = Opt::from_args();

    let settings = Settings::new(opt.config_path).unwrap_or_else(|err| {
        eprintln!("{}", err);
        process::exit(1);
    });
    let Settings {
        log: log_settings,
        dataset: dataset_settings,
        partition: partition_settings,
        root: root_settings,
        attack: attack_settings,
    } = settings;

    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(log_settings.filter)
        .with_ansi(true)
        .init();

    let result = SyntheticLoader::from(&dataset_settings)
        .load(&dataset_settings.name)
        .context("failed to load the dataset")
        .and_then(|dataset| {
            let num_classes = dataset.num_classes;
            let root = if root_settings.enabled {
                run_root(&dataset.train, num_classes, &root_settings)?
            } else {
                IndexSet::new()
            };
            let shares = run_partition(&dataset.train, num_classes, &root, &partition_settings)?;
            run_attack(&dataset.train, num_classes, &shares, &attack_settings)
        });

    if let Err(err) = result {
        error!("simulation failed: {:?}", err);
        process::exit(1);
    }
    info!("simulation finished");
}

fn run_root(
    source: &InMemorySource,
    num_classes: usize,
    settings: &RootSettings,
) -> anyhow::Result<IndexSet> {
    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
    let root = select_root(source, num_classes, &RootSetParams::from(settings), &mut rng)
        .context("failed to select the root set")?;
    let share = Share::new(source, root.clone())?;
    info!(
        "root set of {} samples, label distribution: {:?}",
        root.len(),
        label_histogram(&share, num_classes)?
    );
    Ok(root)
}

/// Partitions all samples except the root set.
fn run_partition(
    source: &InMemorySource,
    num_classes: usize,
    root: &IndexSet,
    settings: &PartitionSettings,
) -> anyhow::Result<Vec<IndexSet>> {
    let policy = settings.policy()?;
    let pool = Share::new(source, root.complement(source.len()))?;
    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
    let shares = partition(&pool, num_classes, settings.participants, policy, &mut rng)
        .context("failed to partition the dataset")?
        .iter()
        .map(|positions| pool.resolve_indices(positions))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        "{} samples partitioned across {} participants ({}), {} root samples excluded",
        pool.len(),
        settings.participants,
        settings.distribution,
        source.len() - pool.len(),
    );
    PartitionStats::new(source, num_classes, &shares)?.log();
    Ok(shares)
}

fn run_attack(
    source: &InMemorySource,
    num_classes: usize,
    shares: &[IndexSet],
    settings: &AttackSettings,
) -> anyhow::Result<()> {
    if settings.malicious_participants == 0 {
        debug!("no malicious participants");
        return Ok(());
    }

    let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
    for (participant, indices) in shares
        .iter()
        .take(settings.malicious_participants)
        .enumerate()
    {
        let share = Share::new(source, indices.clone())?;
        let poisoned = PoisonedSource::new(share, num_classes, &settings.kind, &mut rng)
            .with_context(|| format!("failed to poison participant {}", participant));
        let poisoned = match poisoned {
            Ok(poisoned) => poisoned,
            Err(err) if indices.is_empty() => {
                warn!("{:?}", err);
                continue;
            }
            Err(err) => return Err(err),
        };
        info!(
            "malicious participant {} ({}): poisoned label distribution: {:?}",
            participant,
            settings.kind,
            label_histogram(&poisoned, num_classes)?
        );
    }
    Ok(())
}
