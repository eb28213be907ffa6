//! # Keys Subcommand
//!
//! Verification-key preflight. Reports, per circuit, whether
//! `<dir>/<circuitId>/verification_key.json` can be read.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use zkauth_core::CircuitId;
use zkauth_zkp::{FsKeyLoader, KeyError, KeyLoader};

/// Arguments for the `zkauth keys` subcommand.
#[derive(Args, Debug)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub command: KeysCommand,
}

/// Key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Check that verification keys exist and are readable.
    Check {
        /// Keys directory.
        #[arg(long, default_value = "./keys")]
        dir: PathBuf,

        /// Circuits to check. Defaults to every supported circuit.
        #[arg(long = "circuit", value_name = "CIRCUIT_ID")]
        circuits: Vec<CircuitId>,
    },
}

/// Outcome of checking one circuit.
#[derive(Debug)]
pub struct KeyStatus {
    pub circuit: CircuitId,
    pub result: Result<usize, KeyError>,
}

/// Execute the keys subcommand.
pub fn run_keys(args: &KeysArgs) -> Result<u8> {
    match &args.command {
        KeysCommand::Check { dir, circuits } => {
            let loader = FsKeyLoader::new(dir.clone());
            let statuses = check_keys(&loader, circuits);
            let mut missing = 0;
            for status in &statuses {
                match &status.result {
                    Ok(len) => println!("ok       {:<30} {} bytes", status.circuit, len),
                    Err(err) => {
                        missing += 1;
                        println!("MISSING  {:<30} {err}", status.circuit);
                    }
                }
            }
            if missing > 0 {
                tracing::error!(missing, dir = %dir.display(), "verification keys unavailable");
                return Ok(1);
            }
            Ok(0)
        }
    }
}

/// Try to load each circuit's key; an empty list means every circuit.
pub fn check_keys(loader: &dyn KeyLoader, circuits: &[CircuitId]) -> Vec<KeyStatus> {
    let circuits = if circuits.is_empty() {
        CircuitId::ALL.to_vec()
    } else {
        circuits.to_vec()
    };
    circuits
        .into_iter()
        .map(|circuit| KeyStatus {
            circuit,
            result: loader.load(circuit).map(|key| key.as_bytes().len()),
        })
        .collect()
}
