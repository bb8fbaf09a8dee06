use anon_signals::{
    utils::validate_and_strip_hex, Config, EpochContext, Halo2Backend, Identity, MembershipTree,
    SignalProver, CIRCUIT_K,
};
use anyhow::{Context, Result};
use clap::Parser;
use pasta_curves::pallas;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File with one hex identity commitment per line, in insertion order.
    /// Falls back to `group.member_file` from the config.
    #[arg(short, long)]
    group_file: Option<PathBuf>,

    /// Identity seed, e.g. a wallet-signed message.
    #[arg(short, long, env = "ANON_SIGNALS_SEED")]
    seed: String,

    /// The signal message to publish.
    #[arg(short, long)]
    message: String,

    /// Context label scoping the nullifier (e.g. a poll id).
    #[arg(short, long, default_value = "default")]
    context: String,

    /// Output path for the proof bundle. Falls back to `proof.output_file`
    /// from the config.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_commitment(line: &str) -> Result<pallas::Base> {
    let stripped = validate_and_strip_hex(line, 64)?;
    let bytes = hex::decode(&stripped).context("Failed to decode commitment from hex")?;
    let arr: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("Commitment must be exactly 32 bytes"))?;
    anon_signals::utils::field_from_bytes(&arr)
        .ok_or_else(|| anyhow::anyhow!("Commitment is not a canonical field element"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args
        .config
        .as_ref()
        .map(Config::load_from_file_or_default)
        .unwrap_or_default();
    config.validate().context("Invalid configuration")?;

    let group_file = args
        .group_file
        .or_else(|| config.group.member_file.clone())
        .context("No group file given; pass --group-file or set group.member_file in the config")?;
    let output = args
        .output
        .unwrap_or_else(|| config.proof.output_file.clone());

    println!("Loading group members from: {}", group_file.display());

    let metadata =
        fs::metadata(&group_file).context("Failed to read group file metadata")?;
    if metadata.len() > config.group.max_file_size {
        return Err(anyhow::anyhow!(
            "Group file too large: {} bytes (max {} bytes)",
            metadata.len(),
            config.group.max_file_size
        ));
    }

    let group_content =
        fs::read_to_string(&group_file).context("Failed to read group file")?;

    let commitments: Vec<pallas::Base> = group_content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            parse_commitment(line)
                .with_context(|| format!("Invalid commitment at line {}", i + 1))
        })
        .collect::<Result<_>>()?;

    if commitments.is_empty() {
        return Err(anyhow::anyhow!(
            "No commitments found in group file '{}'",
            group_file.display()
        ));
    }

    println!(
        "Loaded {} commitments from {}",
        commitments.len(),
        group_file.display()
    );

    println!("Deriving identity from seed...");
    let identity = Identity::from_seed(args.seed.as_bytes())?;
    let commitment = identity.commitment();

    let leaf_index = commitments
        .iter()
        .position(|c| *c == commitment)
        .context(format!(
            "This identity's commitment is not in group file '{}'. Make sure your seed matches a registered member.",
            group_file.display()
        ))?;
    println!("Found identity commitment at index {leaf_index}");

    println!("Building membership tree (depth {})...", config.group.tree_depth);
    let tree = MembershipTree::with_leaves(config.group.tree_depth, commitments)?;
    println!(
        "Merkle root: {}",
        hex::encode(anon_signals::utils::field_to_bytes(tree.current_root()))
    );

    println!("Generating membership proof...");
    let membership = tree.proof_for(leaf_index)?;

    println!("Setting up proving backend (k = {CIRCUIT_K}, this may take a while)...");
    let backend = Arc::new(Halo2Backend::new(CIRCUIT_K)?);

    let mut prover = SignalProver::new(backend).with_pinned_root(tree.current_root());
    if let Some(secs) = config.prover.timeout_secs {
        prover = prover.with_timeout(Duration::from_secs(secs));
    }

    let context = EpochContext::new(args.context.as_bytes());
    println!("Generating signal proof...");
    let bundle = prover.prove(&identity, &membership, args.message.as_bytes(), context)?;

    println!("Proof generated, size: {} bytes", bundle.proof.len());

    println!("Writing proof bundle to: {}", output.display());
    let json_output =
        serde_json::to_string_pretty(&bundle).context("Failed to serialize proof to JSON")?;
    fs::write(&output, json_output).context("Failed to write proof file")?;

    println!("Proof bundle successfully generated and saved!");
    println!("Merkle Root: {}", bundle.merkle_root);
    println!("Nullifier: {}", bundle.nullifier_hash);
    println!("Signal Hash: {}", bundle.signal_hash);

    Ok(())
}
