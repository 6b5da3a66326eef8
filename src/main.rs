fn main() -> anyhow::Result<()> {
    tessera::run()?;
    Ok(())
}
