use anon_signals::{utils::field_to_bytes, Identity};
use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// Generates test group members: random identity seeds and the commitment
/// list a prover or verifier builds the membership tree from.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of members to generate.
    #[arg(short, long, default_value_t = 8)]
    count: usize,

    /// Output file for identity commitments, one hex line per member.
    #[arg(short, long, default_value = "group.txt")]
    group_file: PathBuf,

    /// Output file for the matching identity seeds. Keep this private:
    /// anyone holding a seed can signal as that member.
    #[arg(short, long, default_value = "seeds.txt")]
    seed_file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.count == 0 {
        return Err(anyhow::anyhow!("Member count must be at least 1"));
    }

    println!("Generating {} group members...", args.count);

    let mut rng = rand::thread_rng();
    let mut seen = HashSet::new();
    let mut seed_lines = Vec::with_capacity(args.count);
    let mut commitment_lines = Vec::with_capacity(args.count);

    while commitment_lines.len() < args.count {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let seed_hex = hex::encode(seed);

        let identity = Identity::from_seed(seed_hex.as_bytes())?;
        let commitment = hex::encode(field_to_bytes(identity.commitment()));

        // Duplicate commitments would make leaf lookup ambiguous.
        if !seen.insert(commitment.clone()) {
            continue;
        }

        seed_lines.push(seed_hex);
        commitment_lines.push(commitment);
    }

    fs::write(&args.group_file, commitment_lines.join("\n") + "\n")
        .with_context(|| format!("Failed to write group file: {}", args.group_file.display()))?;
    fs::write(&args.seed_file, seed_lines.join("\n") + "\n")
        .with_context(|| format!("Failed to write seed file: {}", args.seed_file.display()))?;

    println!("Generated {} members", args.count);
    println!("Commitments written to: {}", args.group_file.display());
    println!("Seeds written to: {} (keep private!)", args.seed_file.display());
    println!("\nExample usage:");
    println!(
        "  prover --group-file {} --seed <line from {}> --message \"hello\" --context poll-1",
        args.group_file.display(),
        args.seed_file.display()
    );

    Ok(())
}
