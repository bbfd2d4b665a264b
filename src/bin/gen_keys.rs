//! Generates the RS256 key pair used for service tokens.
//!
//! Writes a 2048-bit RSA private key (PKCS#1 PEM, mode 0600) and its public
//! key (SPKI PEM, mode 0644) into the output directory.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

#[derive(Parser)]
#[command(name = "gen-keys")]
#[command(about = "Generate the RS256 key pair for service tokens")]
struct Cli {
    /// Directory the PEM files are written into
    #[arg(default_value = "./secrets")]
    out_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("create {}", cli.out_dir.display()))?;

    let mut rng = rand::rngs::OsRng;
    let private = RsaPrivateKey::new(&mut rng, 2048).context("generate RSA key")?;
    let public = RsaPublicKey::from(&private);

    let private_pem = private
        .to_pkcs1_pem(LineEnding::LF)
        .context("encode private key")?;
    let public_pem = public
        .to_public_key_pem(LineEnding::LF)
        .context("encode public key")?;

    let private_path = cli.out_dir.join("jwt_private.pem");
    let public_path = cli.out_dir.join("jwt_public.pem");

    write_with_mode(&private_path, private_pem.as_bytes(), 0o600)?;
    write_with_mode(&public_path, public_pem.as_bytes(), 0o644)?;

    println!("Wrote {}", private_path.display());
    println!("Wrote {}", public_path.display());

    Ok(())
}

fn write_with_mode(path: &std::path::Path, contents: &[u8], mode: u32) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("chmod {}", path.display()))?;
    }

    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
