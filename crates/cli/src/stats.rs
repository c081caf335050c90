use stubdex_core::EngineConfig;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DomainRow {
    domain: String,
    values: usize,
    files: usize,
}

pub fn run(config: EngineConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = stubdex_runtime::build_default_engine(config)?;
    let stats = runtime.engine.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!(
        "{} stubs, {} interned names, index version {}{}",
        stats.stubs,
        stats.names,
        stats.index_version,
        if stats.buffering { " (buffering)" } else { "" }
    );
    let rows: Vec<DomainRow> = stats
        .domains
        .iter()
        .map(|d| DomainRow {
            domain: d.domain.to_string(),
            values: d.values,
            files: d.files,
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}
