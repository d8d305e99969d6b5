use std::{fs, path::PathBuf};

use alloy_primitives::Address;
use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use message_counter_signer::{
    calldata, parse_signature_hex, recover_signer, MessageSigner, TypedDataRequest,
};
use message_counter_types::{digest, Domain, Payload, TypedData};

/// Sign, inspect and verify EIP-712 payloads for the message counter.
///
/// Output is JSON on stdout; diagnostics go through `tracing` (see `RUST_LOG`).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct DomainArgs {
    /// Chain id the counter is deployed on.
    #[arg(long, env = "CHAIN_ID")]
    chain_id: u64,

    /// Deployed counter address (the EIP-712 verifying contract).
    #[arg(long, env = "CONTRACT_ADDRESS")]
    contract: Address,
}

impl DomainArgs {
    fn domain(&self) -> Domain {
        Domain::message_counter(self.chain_id, self.contract)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the domain separator, struct hash and digest of a payload.
    Digest {
        #[command(flatten)]
        domain: DomainArgs,
        #[arg(long)]
        signer: Address,
        #[arg(long)]
        message: String,
    },

    /// Sign a message with a local key and print everything a relayer needs.
    Sign {
        #[command(flatten)]
        domain: DomainArgs,

        /// Signer private key (hex string, 0x...).
        #[arg(long, env = "SIGNER_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,

        #[arg(long)]
        message: String,
    },

    /// Recover the address the contract would credit for a payload + signature.
    Recover {
        #[command(flatten)]
        domain: DomainArgs,
        #[arg(long)]
        signer: Address,
        #[arg(long)]
        message: String,
        /// 65-byte signature (hex, r || s || v).
        #[arg(long)]
        signature: String,
    },

    /// Verify an `eth_signTypedData_v4` JSON document against a signature.
    VerifyTypedData {
        /// Path to the typed data JSON.
        #[arg(long)]
        typed_data: PathBuf,
        /// 65-byte signature (hex, r || s || v).
        #[arg(long)]
        signature: String,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = match cli.command {
        Command::Digest {
            domain,
            signer,
            message,
        } => {
            let domain = domain.domain();
            let payload = Payload::new(signer, message);
            debug!(?domain, "computing digest");
            json!({
                "domainSeparator": domain.separator(),
                "structHash": payload.hash_struct(),
                "digest": digest(&domain, &payload),
            })
        }
        Command::Sign {
            domain,
            private_key,
            message,
        } => {
            let signer = MessageSigner::from_hex(&private_key)?;
            let signed = signer
                .sign_message(&domain.domain(), message)
                .context("failed signing payload")?;
            info!(signer = %signer.address(), digest = %signed.digest, "signed payload");
            json!({
                "signer": signer.address(),
                "digest": signed.digest,
                "signature": format!("0x{}", hex::encode(signed.signature_bytes())),
                "typedData": signed.typed_data(),
                "calldata": format!("0x{}", hex::encode(calldata::set_signer_message(&signed))),
            })
        }
        Command::Recover {
            domain,
            signer,
            message,
            signature,
        } => {
            let payload = Payload::new(signer, message);
            let sig = parse_signature_hex(&signature)?;
            let recovered = recover_signer(&domain.domain(), &payload, &sig)
                .map_err(|e| anyhow::anyhow!("signature does not recover: {e:?}"))?;
            if recovered != signer {
                warn!(
                    %recovered,
                    claimed = %signer,
                    "recovered signer differs from payload signer"
                );
            }
            json!({
                "recovered": recovered,
                "matchesPayloadSigner": recovered == signer,
            })
        }
        Command::VerifyTypedData {
            typed_data,
            signature,
        } => {
            let raw = fs::read_to_string(&typed_data)
                .with_context(|| format!("failed reading {}", typed_data.display()))?;
            let request = TypedDataRequest::from_json(&raw)?;
            let (domain, payload) = request.verify()?;
            let sig = parse_signature_hex(&signature)?;
            let recovered = recover_signer(&domain, &payload, &sig)
                .map_err(|e| anyhow::anyhow!("signature does not recover: {e:?}"))?;
            ensure!(
                recovered == payload.signer,
                "typed data is signed by {recovered}, not by {}",
                payload.signer
            );
            json!({
                "digest": digest(&domain, &payload),
                "recovered": recovered,
            })
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("failed serialising output")?
    );
    Ok(())
}
