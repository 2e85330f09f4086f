//! Toad - CSS-in-JS template extractor.

fn main() -> anyhow::Result<()> {
    toad::cli::run()
}
