//! Mints RS256 service tokens for local development and testing.
//!
//! The private key is read from the environment variable named by `--env`,
//! as either a multi-line PEM or a single line with `\n` escapes.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

use conduit::api::middleware::auth::Claims;

#[derive(Parser)]
#[command(name = "mint-token")]
#[command(about = "Mint an RS256 service token")]
struct Cli {
    /// tenant_id claim value
    #[arg(long, default_value_t = 1)]
    tenant: u64,

    /// Token TTL in seconds
    #[arg(long, default_value_t = 1800)]
    ttl: i64,

    /// Issuer (iss)
    #[arg(long, default_value = "conduit")]
    iss: String,

    /// Subject (sub)
    #[arg(long, default_value = "dev-client")]
    sub: String,

    /// Environment variable holding the RSA private key PEM
    #[arg(long, default_value = "JWT_PRIVATE_KEY_PEM")]
    env: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let raw = std::env::var(&cli.env)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{} is not set", cli.env))?;

    // Support single-line env values with \n escapes.
    let pem = raw.replace("\\n", "\n");

    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).context("parse private key pem")?;

    let now = Utc::now().timestamp();
    let claims = Claims {
        tenant_id: cli.tenant,
        exp: now + cli.ttl,
        iat: Some(now),
        iss: Some(cli.iss),
        sub: Some(cli.sub),
    };

    let token = encode(&Header::new(Algorithm::RS256), &claims, &key).context("sign token")?;
    println!("{token}");

    Ok(())
}
