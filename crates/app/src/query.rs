//! Interactive, read-only menu over the `ocr_results` store.
//!
//! Every user-supplied value reaches SQLite as a bound parameter. A failing
//! query is reported and the menu comes back; only "Exit" or end of input
//! leaves the loop.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;
use intake_core::StoredRecord;
use intake_storage::{QueryOutput, StoreError};

const MENU: &str = "\nInteractive Database Query
1. Show all records
2. Find patients with pain level above a certain threshold
3. Find patients with high difficulty ratings
4. Run a custom read-only SQL query
5. Exit query mode";

pub async fn interactive(db_path: &Path, mut input: impl BufRead, mut out: impl Write) -> Result<()> {
    if let Err(e) = intake_storage::ensure_schema(db_path).await {
        tracing::warn!(db = %db_path.display(), "Could not prepare store: {e}");
    }

    loop {
        writeln!(out, "{MENU}")?;
        let Some(choice) = prompt(&mut input, &mut out, "Enter choice: ")? else {
            break;
        };

        match choice.as_str() {
            "1" => {
                let result = intake_storage::all_records(db_path).await;
                print_records(&mut out, result)?;
            }
            "2" => {
                let Some(raw) = prompt(&mut input, &mut out, "Enter pain level threshold: ")? else {
                    break;
                };
                match raw.parse::<i64>() {
                    Ok(threshold) => {
                        let result = intake_storage::records_with_pain_above(db_path, threshold).await;
                        print_records(&mut out, result)?;
                    }
                    Err(_) => writeln!(out, "Invalid threshold '{raw}': enter a whole number.")?,
                }
            }
            "3" => {
                let Some(task) =
                    prompt(&mut input, &mut out, "Enter task name (e.g., bending, sleeping): ")?
                else {
                    break;
                };
                let Some(level) = prompt(&mut input, &mut out, "Enter difficulty level threshold: ")? else {
                    break;
                };
                let result = intake_storage::records_with_task_difficulty(db_path, &task, &level).await;
                print_records(&mut out, result)?;
            }
            "4" => {
                let Some(sql) = prompt(&mut input, &mut out, "Enter SQL query: ")? else {
                    break;
                };
                match intake_storage::run_read_only(db_path, &sql).await {
                    Ok(output) => print_table(&mut out, &output)?,
                    Err(e) => writeln!(out, "Query failed: {e}")?,
                }
            }
            "5" => break,
            _ => writeln!(out, "Invalid choice. Try again.")?,
        }
    }

    Ok(())
}

/// `None` on end of input.
fn prompt(input: &mut impl BufRead, out: &mut impl Write, label: &str) -> Result<Option<String>> {
    write!(out, "{label}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn print_records(
    out: &mut impl Write,
    result: Result<Vec<StoredRecord>, StoreError>,
) -> Result<()> {
    match result {
        Ok(rows) if rows.is_empty() => writeln!(out, "\nNo results found.")?,
        Ok(rows) => {
            writeln!(out, "\nQuery Results:")?;
            for row in rows {
                writeln!(out, "{row}")?;
            }
        }
        Err(e) => writeln!(out, "Query failed: {e}")?,
    }
    Ok(())
}

fn print_table(out: &mut impl Write, output: &QueryOutput) -> Result<()> {
    if output.rows.is_empty() {
        writeln!(out, "\nNo results found.")?;
        return Ok(());
    }
    writeln!(out, "\nQuery Results:")?;
    writeln!(out, "{}", output.columns.join(" | "))?;
    for row in &output.rows {
        writeln!(out, "({})", row.join(", "))?;
    }
    Ok(())
}
