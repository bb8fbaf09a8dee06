use anon_signals::{
    utils::field_from_bytes, utils::validate_and_strip_hex, Config, Halo2Backend, MembershipTree,
    ProofBundle, SignalError, SignalVerifier, CIRCUIT_K,
};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use pasta_curves::pallas;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Proof bundle produced by the prover.
    #[arg(short, long)]
    proof_file: PathBuf,

    /// File with one hex identity commitment per line, in insertion order.
    #[arg(short, long)]
    group_file: PathBuf,

    /// The claimed signal message; must match the bundle's signal hash.
    #[arg(short, long)]
    message: String,

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
    field_from_bytes(&arr)
        .ok_or_else(|| anyhow::anyhow!("Commitment is not a canonical field element"))
}

fn decode_entry(hex_str: &str, name: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_str.trim())
        .with_context(|| format!("Invalid {name} hex in nullifier file"))?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("{name} in nullifier file must be 32 bytes"))
}

/// Reads persisted `<context>:<nullifier>` lines, grouped by context.
fn load_nullifier_file(path: &Path) -> Result<HashMap<[u8; 32], Vec<[u8; 32]>>> {
    let mut entries: HashMap<[u8; 32], Vec<[u8; 32]>> = HashMap::new();
    if !path.exists() {
        return Ok(entries);
    }

    let file = fs::File::open(path).context("Failed to open nullifier file")?;
    for line in BufReader::new(file).lines() {
        let line = line.context("Failed to read line from nullifier file")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (ctx, nf) = line
            .split_once(':')
            .context("Malformed nullifier file line, expected '<context>:<nullifier>'")?;
        entries
            .entry(decode_entry(ctx, "context")?)
            .or_default()
            .push(decode_entry(nf, "nullifier")?);
    }
    Ok(entries)
}

fn append_nullifier(path: &Path, context: &str, nullifier: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open nullifier file for append")?;
    writeln!(file, "{}:{}", context.trim().to_lowercase(), nullifier.trim().to_lowercase())
        .context("Failed to write nullifier")?;
    Ok(())
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

    if !args.proof_file.exists() {
        return Err(anyhow::anyhow!(
            "Proof file does not exist: {}",
            args.proof_file.display()
        ));
    }

    info!("Loading proof bundle from: {}", args.proof_file.display());
    println!("Loading proof bundle from: {}", args.proof_file.display());

    let metadata =
        fs::metadata(&args.proof_file).context("Failed to read proof file metadata")?;
    debug!("Proof file size: {} bytes", metadata.len());
    if metadata.len() > config.proof.max_file_size {
        return Err(anyhow::anyhow!(
            "Proof file too large: {} bytes (max {} bytes). This may indicate a corrupted proof file.",
            metadata.len(),
            config.proof.max_file_size
        ));
    }

    let proof_content =
        fs::read_to_string(&args.proof_file).context("Failed to read proof file")?;
    let bundle: ProofBundle =
        serde_json::from_str(&proof_content).context("Failed to parse proof JSON")?;

    println!("Proof details:");
    println!("  Merkle Root: {}", bundle.merkle_root);
    println!("  Nullifier: {}", bundle.nullifier_hash);
    println!("  Context: {}", bundle.context);
    println!("  Timestamp: {}", bundle.timestamp);
    println!("  Proof Size: {} bytes", bundle.proof.len());

    if bundle.proof.len() > config.proof.max_proof_bytes {
        return Err(anyhow::anyhow!(
            "Proof size exceeds limit: {} bytes (max {} bytes). Verify CIRCUIT_K matches between prover and verifier (current: {}).",
            bundle.proof.len(),
            config.proof.max_proof_bytes,
            CIRCUIT_K
        ));
    }

    println!("Rebuilding membership tree from: {}", args.group_file.display());
    let group_content =
        fs::read_to_string(&args.group_file).context("Failed to read group file")?;
    let commitments: Vec<pallas::Base> = group_content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            parse_commitment(line)
                .with_context(|| format!("Invalid commitment at line {}", i + 1))
        })
        .collect::<Result<_>>()?;

    println!("Setting up proving backend (k = {CIRCUIT_K}, this may take a while)...");
    let backend = Arc::new(Halo2Backend::new(CIRCUIT_K)?);
    let verifier = SignalVerifier::new(backend, config.verifier.root_history)
        .with_timestamp_limits(
            config.security.timestamp_tolerance_secs,
            config.security.timestamp_max_age_secs,
        );

    // Replay insertions so the trusted window covers proofs generated while
    // the last few members joined.
    let mut tree = MembershipTree::new(config.group.tree_depth);
    verifier.track_root(tree.current_root());
    for commitment in commitments {
        tree.insert(commitment)?;
        verifier.track_root(tree.current_root());
    }
    println!("Tree rebuilt with {} leaves", tree.leaf_count());

    let nullifier_path = config.verifier.nullifier_file.clone().unwrap_or_else(|| {
        let mut sidecar = args.proof_file.clone();
        sidecar.set_extension("nullifiers.txt");
        sidecar
    });
    debug!("Nullifier file: {}", nullifier_path.display());

    for (context, nullifiers) in load_nullifier_file(&nullifier_path)? {
        verifier.ledger().preload(&context, nullifiers);
    }

    info!("Verifying signal proof...");
    println!("Verifying signal proof...");

    match verifier.submit(&bundle, args.message.as_bytes()) {
        Ok(receipt) => {
            info!("Proof verification PASSED");
            println!("\n✓ Proof verification PASSED!");
            println!("The submitter has demonstrated membership in the group");
            println!("without revealing which member they are.");
            println!("\nNullifier: {}", receipt.nullifier_hash);
            println!("This nullifier prevents the same member from signaling");
            println!("twice in this context while preserving their anonymity.");

            append_nullifier(&nullifier_path, &bundle.context, &bundle.nullifier_hash)
                .with_context(|| {
                    format!("Failed to record nullifier to: {}", nullifier_path.display())
                })?;
            info!("Nullifier recorded to: {}", nullifier_path.display());
            println!("\nNullifier recorded to: {}", nullifier_path.display());
            Ok(())
        }
        Err(e) => {
            error!("Proof verification FAILED: {e}");
            println!("\n✗ Proof verification FAILED!");
            let reason = match &e {
                SignalError::UnknownRoot => {
                    "The proof references a root outside the trusted window; regenerate it against the current tree."
                }
                SignalError::DuplicateNullifier => {
                    "This nullifier was already accepted; replaying a signal is not allowed."
                }
                _ => "The proof is cryptographically or structurally invalid.",
            };
            println!("Error: {e}");
            println!("{reason}");
            Err(anyhow::anyhow!("Proof verification failed: {e}"))
        }
    }
}
