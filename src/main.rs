use clap::Parser;
use env_logger::Env;
use nitrotoken::attestation::{
    parse_attestation_for_view, root_der_from_pem, AttestationDocument, Verifier,
};
use nitrotoken::client::{Attestation, AttestationClient};
use nitrotoken::policy::{validate_pcr0_hash, Pcr0ValidationResult, PcrConfig};
use std::error::Error;
use std::fs;
use std::io;
use std::time::Duration;

#[derive(Parser)]
enum NitroTokenCli {
    Verify(VerifyArgs),
    Pcr0(Pcr0Args),
    Fetch(FetchArgs),
    Golden(GoldenArgs),
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Authenticate the supplied base64 attestation document against \
    the trusted root and the expected nonce")]
struct VerifyArgs {
    #[arg(short, long, default_value = "attestation.b64")]
    document: String,

    #[arg(short, long)]
    nonce: String,

    /// PEM trust anchor, the bundled AWS Nitro Enclaves root if absent
    #[arg(short, long)]
    root: Option<String>,

    /// check certificate validity at this Unix time instead of now
    #[arg(short, long)]
    at: Option<i64>,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Appraise a PCR0 measurement against known good values and the \
    signed release history")]
struct Pcr0Args {
    /// hex encoded PCR0
    pcr0: String,

    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Fetch a fresh attestation document from an enclave backend, \
    authenticate it and appraise its PCR0")]
struct FetchArgs {
    #[arg(short, long, default_value = "http://localhost:3000")]
    api_url: String,

    #[arg(short, long)]
    config: Option<String>,

    /// request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Extract the PCR0 of the supplied attestation document, after \
    successful verification, into a PCR policy file")]
struct GoldenArgs {
    #[arg(short, long, default_value = "attestation.b64")]
    document: String,

    #[arg(short, long)]
    nonce: String,

    #[arg(short, long, default_value = "pcr-config.json")]
    config: String,

    /// record the value as a development build
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    match NitroTokenCli::parse() {
        NitroTokenCli::Verify(args) => match verify(&args) {
            Ok(j) => println!("{j}"),
            Err(e) => eprintln!("verification failed: {e}"),
        },

        NitroTokenCli::Pcr0(args) => match pcr0(&args).await {
            Ok(r) => print_pcr0(&r),
            Err(e) => eprintln!("PCR0 appraisal failed: {e}"),
        },

        NitroTokenCli::Fetch(args) => match fetch(&args).await {
            Ok(r) => print_pcr0(&r),
            Err(e) => eprintln!("attestation failed: {e}"),
        },

        NitroTokenCli::Golden(args) => match golden(&args) {
            Ok(_) => println!("golden value extraction successful"),
            Err(e) => eprintln!("golden value extraction failed: {e}"),
        },
    }
}

fn print_pcr0(r: &Pcr0ValidationResult) {
    match &r.verified_at {
        Some(t) => println!("{} (released {})", r.text, t),
        None => println!("{}", r.text),
    }
}

fn load_config(path: &Option<String>) -> Result<PcrConfig, Box<dyn Error>> {
    match path {
        Some(p) => Ok(PcrConfig::load_json(&fs::read_to_string(p)?)?),
        None => Ok(PcrConfig::default()),
    }
}

fn authenticate(
    document: &str,
    nonce: &str,
    root: &Option<String>,
    at: Option<i64>,
) -> Result<AttestationDocument, Box<dyn Error>> {
    let b64 = fs::read_to_string(document)?;

    let mut v = match root {
        Some(p) => Verifier::new(root_der_from_pem(&fs::read(p)?)?),
        None => Verifier::aws()?,
    };

    if let Some(t) = at {
        v = v.with_validation_time(t);
    }

    Ok(v.authenticate(&b64, nonce)?)
}

fn verify(args: &VerifyArgs) -> Result<String, Box<dyn Error>> {
    let doc = authenticate(&args.document, &args.nonce, &args.root, args.at)?;

    let view = parse_attestation_for_view(&doc, &doc.cabundle)?;

    Ok(serde_json::to_string_pretty(&view)?)
}

async fn pcr0(args: &Pcr0Args) -> Result<Pcr0ValidationResult, Box<dyn Error>> {
    let config = load_config(&args.config)?;

    Ok(validate_pcr0_hash(&args.pcr0.to_lowercase(), &config).await?)
}

async fn fetch(args: &FetchArgs) -> Result<Pcr0ValidationResult, Box<dyn Error>> {
    let config = load_config(&args.config)?;

    let c = AttestationClient::connect(&args.api_url, args.timeout.map(Duration::from_secs))?;

    println!("backend: {}", c.health_check().await?);

    let h = c.handshake().await?;

    println!("server public key: {}", hex::encode(&h.server_public_key));

    match &h.attestation {
        Attestation::Enclave(doc) => {
            let pcr0 = doc.pcr0().ok_or("document carries no PCR0")?;

            Ok(validate_pcr0_hash(&hex::encode(pcr0), &config).await?)
        }
        Attestation::Local { .. } => Ok(Pcr0ValidationResult {
            is_match: false,
            text: format!("{} is a local backend, nothing to appraise", args.api_url),
            verified_at: None,
        }),
    }
}

/// A missing policy file is an empty policy, other read failures are errors
fn read_or_default(path: &str) -> Result<PcrConfig, Box<dyn Error>> {
    match fs::read_to_string(path) {
        Ok(j) => Ok(PcrConfig::load_json(&j)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PcrConfig::default()),
        Err(e) => Err(format!("{path}: {e}").into()),
    }
}

fn golden(args: &GoldenArgs) -> Result<(), Box<dyn Error>> {
    let doc = authenticate(&args.document, &args.nonce, &None, None)?;

    let pcr0 = doc.pcr0().ok_or("document carries no PCR0")?;

    let mut config = read_or_default(&args.config)?;

    let list = if args.dev {
        config.pcr0_dev_values.get_or_insert_with(Vec::new)
    } else {
        config.pcr0_values.get_or_insert_with(Vec::new)
    };

    let v = hex::encode(pcr0);
    if !list.contains(&v) {
        list.push(v);
    }

    fs::write(&args.config, serde_json::to_string_pretty(&config)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> String {
        let p = std::env::temp_dir().join(format!("nitrotoken-{}-{name}", std::process::id()));
        p.to_string_lossy().into_owned()
    }

    #[test]
    fn missing_policy_file_is_default() {
        let p = scratch("absent.json");

        assert_eq!(read_or_default(&p).unwrap(), PcrConfig::default());
    }

    #[test]
    fn unreadable_policy_file_is_kept() {
        let p = scratch("latin1.json");
        fs::write(&p, [0x7b, 0xff, 0xfe, 0x7d]).unwrap();

        assert!(read_or_default(&p).is_err());
        assert_eq!(fs::read(&p).unwrap(), vec![0x7b, 0xff, 0xfe, 0x7d]);

        fs::remove_file(&p).unwrap();
    }
}
