use anyhow::Result;

pub fn run() -> Result<()> {
    println!("promptledger {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
