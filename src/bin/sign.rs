//! Computes the webhook signature for a payload and prints a ready-to-run
//! curl command, for testing a deployment end to end without the PBX
//! platform in the loop.

use anyhow::{bail, Context, Result};
use trunkline_api::crypto;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(sender_id), Some(secret), Some(body)) = (args.next(), args.next(), args.next())
    else {
        bail!("usage: trunkline-sign <sender-id> <secret> <json-body>");
    };

    let canonical =
        crypto::canonical_body(body.as_bytes()).context("body is not valid UTF-8")?;
    let signature = crypto::generate_hmac_hex(canonical.as_bytes(), &secret)
        .context("could not compute signature")?;

    println!("sender id: {sender_id}");
    println!("canonical: {canonical}");
    println!("signature: {signature}");
    println!();
    println!("curl -X POST \"http://localhost:9001/{sender_id}\" \\");
    println!("  -H \"Content-Type: application/json\" \\");
    println!("  -H \"X-Signature: {signature}\" \\");
    println!("  -d '{canonical}'");

    Ok(())
}
