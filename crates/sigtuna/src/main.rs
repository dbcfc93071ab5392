#![forbid(unsafe_code)]

//! sigtuna CLI: validate SAML 2.0 Responses.
//!
//! Exit status is 0 when the Response is accepted, 1 when it is rejected and
//! 2 for usage, I/O or configuration errors.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sigtuna_core::{algorithm, Error};
use sigtuna_keys::TrustCertificate;
use sigtuna_saml::{Outcome, ResponseValidator, SpConfig};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

const EXIT_REJECTED: i32 = 1;
const EXIT_USAGE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "sigtuna",
    about = "Sigtuna: SAML 2.0 Response validation for service providers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a SAML Response against the identity provider's certificate
    VerifyResponse {
        /// Response file (XML, or the base64 form value with --base64)
        file: PathBuf,

        /// Identity provider certificate (PEM, DER or bare base64)
        #[arg(long, env = "SIGTUNA_IDP_CERT")]
        cert: PathBuf,

        /// Service provider settings as JSON; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Assertion consumer service URL the Response must be addressed to
        #[arg(long, env = "SIGTUNA_SP_DESTINATION")]
        destination: Option<String>,

        /// Expected Audience (default: destination)
        #[arg(long)]
        audience: Option<String>,

        /// Expected bearer Recipient (default: destination)
        #[arg(long)]
        recipient: Option<String>,

        /// ID of the AuthnRequest this Response must answer
        #[arg(long = "in-response-to")]
        in_response_to: Option<String>,

        /// Clock skew tolerance in seconds
        #[arg(long = "clock-skew")]
        clock_skew: Option<u32>,

        /// Validate as of this RFC 3339 instant instead of the current time
        #[arg(long, value_parser = parse_instant)]
        now: Option<DateTime<Utc>>,

        /// Input is base64 encoded, as posted by the HTTP-POST binding
        #[arg(long)]
        base64: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the accepted algorithms
    Info,
}

/// Service provider settings gathered from the command line.
struct SpArgs {
    config: Option<PathBuf>,
    destination: Option<String>,
    audience: Option<String>,
    recipient: Option<String>,
    in_response_to: Option<String>,
    clock_skew: Option<u32>,
}

fn main() {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Commands::VerifyResponse { verbose: true, .. });
    init_logging(verbose);

    let result = match cli.command {
        Commands::VerifyResponse {
            file,
            cert,
            config,
            destination,
            audience,
            recipient,
            in_response_to,
            clock_skew,
            now,
            base64,
            json,
            verbose,
        } => {
            let sp = SpArgs { config, destination, audience, recipient, in_response_to, clock_skew };
            cmd_verify_response(&file, &cert, sp, now, base64, json, verbose)
        }
        Commands::Info => {
            cmd_info();
            Ok(0)
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(EXIT_USAGE);
        }
    }
}

fn init_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(verbose))
        .init();
}

/// `-v` forces debug; otherwise `RUST_LOG`, falling back to warn.
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

fn cmd_verify_response(
    file: &Path,
    cert: &Path,
    sp: SpArgs,
    now: Option<DateTime<Utc>>,
    base64: bool,
    json: bool,
    verbose: bool,
) -> Result<i32, Error> {
    let config = build_config(sp)?;
    let trust = TrustCertificate::load(&read_bytes(cert)?)?;
    let validator = ResponseValidator::new(config, trust)?;
    let input = read_file(file)?;
    let now = now.unwrap_or_else(Utc::now);

    if verbose {
        eprintln!("Validating: {} at {now}", file.display());
    }

    let outcome = if base64 {
        validator.evaluate_base64(&input, now)
    } else {
        validator.evaluate_xml(&input, now)
    };

    match outcome {
        Outcome::Accepted(accepted) => {
            if json {
                let out = serde_json::json!({ "accepted": true, "assertion": accepted });
                println!("{}", to_json(&out)?);
            } else {
                println!("OK");
                println!("NameID: {}", accepted.name_id.value);
                for (name, values) in accepted.attributes.iter() {
                    println!("{name}: {}", values.join(", "));
                }
                if !accepted.assurance.destination_present {
                    println!("note: response carried no Destination");
                }
            }
            Ok(0)
        }
        Outcome::Rejected { reason, diagnostic } => {
            if json {
                let out = serde_json::json!({
                    "accepted": false,
                    "tampering": reason.is_tampering(),
                    "reason": diagnostic,
                });
                println!("{}", to_json(&out)?);
            } else {
                eprintln!("REJECTED: {diagnostic}");
            }
            Ok(EXIT_REJECTED)
        }
    }
}

fn build_config(sp: SpArgs) -> Result<SpConfig, Error> {
    let mut config = match (&sp.config, sp.destination.as_deref()) {
        (Some(path), _) => serde_json::from_str::<SpConfig>(&read_file(path)?)
            .map_err(|e| Error::Other(format!("{}: {e}", path.display())))?,
        (None, Some(destination)) => SpConfig::new(destination),
        (None, None) => {
            return Err(Error::Other("--destination is required unless --config is given".into()))
        }
    };

    if let Some(destination) = sp.destination {
        config.destination = destination;
    }
    if let Some(audience) = sp.audience {
        config = config.with_audience(audience);
    }
    if let Some(recipient) = sp.recipient {
        config = config.with_recipient(recipient);
    }
    if let Some(request_id) = sp.in_response_to {
        config = config.with_in_response_to(request_id);
    }
    if let Some(secs) = sp.clock_skew {
        config = config.with_clock_skew(secs);
    }
    config.validate()?;
    Ok(config)
}

fn cmd_info() {
    println!("sigtuna {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Canonicalization:");
    println!("  {}", algorithm::EXC_C14N);
    println!("  {}", algorithm::EXC_C14N_WITH_COMMENTS);
    println!();
    println!("Transforms:");
    println!("  {}", algorithm::ENVELOPED_SIGNATURE);
    println!("  {}", algorithm::EXC_C14N);
    println!();
    println!("Digests:");
    for uri in [algorithm::SHA256, algorithm::SHA384, algorithm::SHA512] {
        println!("  {uri}");
    }
    println!();
    println!("Signatures:");
    for uri in [
        algorithm::RSA_SHA256,
        algorithm::RSA_SHA384,
        algorithm::RSA_SHA512,
        algorithm::ECDSA_SHA256,
        algorithm::ECDSA_SHA384,
        algorithm::ECDSA_SHA512,
    ] {
        println!("  {uri}");
    }
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn to_json(value: &serde_json::Value) -> Result<String, Error> {
    serde_json::to_string_pretty(value).map_err(|e| Error::Other(format!("JSON output: {e}")))
}

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}
