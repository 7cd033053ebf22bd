fn main() -> anyhow::Result<()> {
    snapline::run()?;
    Ok(())
}
