use anyhow::Result;
use shelfdex_core::domain::{Book, DuplicateGroup};
use shelfdex_core::Library;

fn describe(book: &Book) -> String {
    format!("#{:<6} {} ({}, {:.1} KB)", book.id, book.key, book.format, book.size as f64 / 1024.0)
}

pub(crate) fn render_group(group: &DuplicateGroup) -> Vec<String> {
    let mut lines = vec![
        format!("{} [{} copies]", group.canonical.title, group.duplicates.len() + 1),
        format!("  {} [CANONICAL]", describe(&group.canonical)),
    ];
    lines.extend(group.duplicates.iter().map(|b| format!("  {}", describe(b))));
    lines
}

pub fn run(library: &Library) -> Result<()> {
    let groups = library.duplicates()?;

    if groups.is_empty() {
        println!("No duplicates found. Run `shelfdex scan` first.");
        return Ok(());
    }

    for group in &groups {
        for line in render_group(group) {
            println!("{line}");
        }
        println!();
    }

    let total: usize = groups.iter().map(|g| g.duplicates.len()).sum();
    println!("{} groups, {} duplicate books", groups.len(), total);
    Ok(())
}
