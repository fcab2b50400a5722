use std::env;

use dbf_reader::{OpenOptions, Table};

fn show(line: impl AsRef<str>) {
    println!("  {}", line.as_ref());
}

fn print_table(path: &str) -> dbf_reader::Result<()> {
    let table = Table::open_with(
        path,
        OpenOptions {
            ignore_missing_memo: true,
            ..OpenOptions::default()
        },
    )?;

    println!("{}:", path);
    show(format!("Name: {}", table.name()));
    show(format!(
        "Memo File: {}",
        table
            .memo_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    ));
    show(format!(
        "DB Version: {}",
        table.header().version_description()
    ));
    show(format!("Records: {}", table.active_count()?));
    show(format!("Deleted Records: {}", table.deleted()?.len()));
    show(format!(
        "Last Updated: {}",
        table
            .header()
            .last_update
            .map(|d| d.to_string())
            .unwrap_or_default()
    ));
    show(format!("Character Encoding: {}", table.encoding().name()));
    show("Fields:");
    for field in table.fields() {
        show(format!("  {field}"));
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <path-to-dbf-file>...", args[0]);
        std::process::exit(1);
    }

    let mut failed = false;
    for path in &args[1..] {
        if let Err(e) = print_table(path) {
            eprintln!("ERROR: Failed to read {path}");
            eprintln!("  {e}");
            failed = true;
        }
    }
    if failed {
        std::process::exit(1);
    }
}
