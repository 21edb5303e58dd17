use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};
use shelfdex_core::domain::CatalogStats;
use shelfdex_core::Library;

pub(crate) fn build_table(stats: &CatalogStats) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new("Catalog"), Cell::new("Count")]);

    let rows = [
        ("Books", stats.books),
        ("Authors", stats.authors),
        ("Genres", stats.genres),
        ("Series", stats.series),
        ("Directories", stats.categories),
        ("Archives", stats.archives),
    ];
    for (label, count) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }

    let duplicates = Cell::new(stats.duplicates).set_alignment(CellAlignment::Right);
    table.add_row(vec![
        Cell::new("Duplicates"),
        if stats.duplicates > 0 {
            duplicates.fg(Color::Yellow)
        } else {
            duplicates
        },
    ]);
    table.add_row(vec![
        Cell::new("Removed").fg(Color::DarkGrey),
        Cell::new(stats.removed_books)
            .set_alignment(CellAlignment::Right)
            .fg(Color::DarkGrey),
    ]);
    table
}

pub fn run(library: &Library) -> Result<()> {
    let stats = library.status()?;

    println!();
    println!("  shelfdex status");
    println!("  ===============");
    println!();
    println!("{}", build_table(&stats));
    if let Some(last) = library.last_scan()? {
        println!("  Last scan: {last}");
    }

    if stats.books == 0 {
        println!();
        println!("  Catalog is empty. Run 'shelfdex scan --root <library>' first.");
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lists_every_total() {
        let stats = CatalogStats {
            books: 1200,
            removed_books: 3,
            duplicates: 17,
            authors: 450,
            genres: 38,
            series: 90,
            categories: 12,
            archives: 4,
        };
        let rendered = build_table(&stats).to_string();

        for label in ["Books", "Authors", "Genres", "Series", "Directories", "Archives", "Duplicates", "Removed"] {
            assert!(rendered.contains(label), "missing {label}");
        }
        assert!(rendered.contains("1200"));
        assert!(rendered.contains("450"));
        assert!(rendered.contains("17"));
    }

    #[test]
    fn test_table_for_empty_catalog() {
        let rendered = build_table(&CatalogStats::default()).to_string();
        assert!(rendered.contains("Books"));
        assert!(rendered.contains('0'));
    }
}
