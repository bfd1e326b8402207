use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::types::{AssembleSummary, RunSummary, TableCounts, TableKeys, VocabSummary};

pub fn print_run_summary(summary: &RunSummary) {
    println!("Input: {}", summary.input_dir.display());
    if summary.dry_run {
        println!("Database: {} (dry run, nothing written)", summary.database.display());
    } else {
        println!("Database: {}", summary.database.display());
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Assembled"),
        header_cell("Inserted"),
        header_cell("Duplicates"),
    ]);
    apply_table_style(&mut table);
    for index in 1..=3 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut assembled = 0usize;
    for counts in &summary.tables {
        assembled += counts.assembled;
        table.add_row(counts_row(counts));
    }
    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(assembled).add_attribute(Attribute::Bold),
        count_cell(summary.total_inserted(), Color::Green).add_attribute(Attribute::Bold),
        count_cell(summary.total_duplicates(), Color::Yellow).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
}

pub fn print_assemble_summary(summary: &AssembleSummary) {
    println!("Input: {}", summary.input_dir.display());
    println!("Output: {}", summary.output_dir.display());
    let mut table = Table::new();
    table.set_header(vec![header_cell("Table"), header_cell("Rows"), header_cell("File")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for file in &summary.files {
        let name = file
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&file.table),
            Cell::new(file.rows),
            dim_cell(name),
        ]);
    }
    println!("{table}");
}

pub fn print_vocab_summary(summary: &VocabSummary) {
    println!("Vocabulary: {}", summary.dir.display());
    println!(
        "{} entries from {} documents (fingerprint {})",
        summary.entries,
        summary.documents,
        short_fingerprint(&summary.fingerprint)
    );
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Field"),
        header_cell("Terms"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for (name, field, count) in &summary.fields {
        table.add_row(vec![Cell::new(name), Cell::new(field), Cell::new(count)]);
    }
    println!("{table}");
}

pub fn print_tables(keys: &[TableKeys]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Table"),
        header_cell("Primary key"),
        header_cell("References"),
        header_cell("Natural key"),
        header_cell("Probe"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for entry in keys {
        table.add_row(vec![
            Cell::new(entry.position),
            Cell::new(entry.table.table_name()).add_attribute(Attribute::Bold),
            entry.primary_key.map_or_else(|| dim_cell("-"), Cell::new),
            if entry.references.is_empty() {
                dim_cell("-")
            } else {
                Cell::new(join_tables(&entry.references))
            },
            dim_cell(entry.natural_key.join(", ")),
            entry.probe_column.map_or_else(|| dim_cell("-"), Cell::new),
        ]);
    }
    println!("{table}");
}

/// Plain one-line-per-table rendering of the load order.
pub fn render_load_order(keys: &[TableKeys]) -> String {
    keys.iter()
        .map(|entry| {
            let references = if entry.references.is_empty() {
                "-".to_string()
            } else {
                join_tables(&entry.references)
            };
            format!(
                "{} {} pk={} refs={}",
                entry.position,
                entry.table.table_name(),
                entry.primary_key.unwrap_or("-"),
                references
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn counts_row(counts: &TableCounts) -> Vec<Cell> {
    vec![
        Cell::new(counts.table.table_name()),
        Cell::new(counts.assembled),
        count_cell(counts.inserted, Color::Green),
        count_cell(counts.duplicates, Color::Yellow),
    ]
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count == 0 {
        dim_cell(count)
    } else {
        Cell::new(count).fg(color)
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).fg(Color::DarkGrey)
}

fn join_tables(tables: &[omop_model::EntityKind]) -> String {
    tables
        .iter()
        .map(|kind| kind.table_name())
        .collect::<Vec<_>>()
        .join(",")
}

fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
