/// Build an archive from a script
///
/// Run with: cargo run --example build -- Demo.vm [output.vdf] [base-dir] ["YYYY-MM-DD HH:MM:SS"]
///
/// Set RUST_LOG=debug to see dedup hits and pruned directories.
use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;
use vdfs_builder::{parse_script, BuildOptions, BuildOverrides};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(script) = args.next() else {
        bail!("usage: build <script.vm> [output.vdf] [base-dir] [timestamp]");
    };

    let non_empty = |arg: Option<String>| arg.filter(|s| !s.is_empty());
    let overrides = BuildOverrides {
        output: non_empty(args.next()),
        base_dir: non_empty(args.next()),
        timestamp: non_empty(args.next()),
    };

    // Options live next to the script as <script>.toml when present
    let options_path = std::path::Path::new(&script).with_extension("toml");
    let options = if options_path.exists() {
        BuildOptions::load(&options_path)
            .with_context(|| format!("failed to load {}", options_path.display()))?
    } else {
        BuildOptions::default()
    };

    let mut request =
        parse_script(&script).with_context(|| format!("failed to parse {}", script))?;
    request.options = options;
    overrides.apply(&mut request, options.time_zone)?;

    let summary = request
        .execute()
        .with_context(|| format!("failed to execute {}", script))?;

    println!("{}", summary.to_json()?);
    Ok(())
}
