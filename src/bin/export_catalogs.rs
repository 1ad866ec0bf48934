use furniture_xr::assembly::CatalogSet;
use std::env;
use std::path::PathBuf;

fn main() {
    if let Err(err) = run() {
        eprintln!("[catalogs] error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let output_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("catalogs/builtin.json"));

    let catalogs = CatalogSet::builtin();
    let json = catalogs.to_json_pretty()?;
    // refuse to write anything the loader would reject
    CatalogSet::from_json(&json)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&output_path, json)?;
    println!(
        "[catalogs] wrote {} catalogs to {}",
        catalogs.len(),
        output_path.display()
    );
    Ok(())
}
