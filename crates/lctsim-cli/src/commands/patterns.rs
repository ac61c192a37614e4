//! `lctsim patterns`: print the pattern template library.

use lctsim_core::{Algorithm, PatternLibrary};

pub fn run(family: &str) {
    let algorithm: Algorithm = family.parse().unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    let library = PatternLibrary::for_algorithm(algorithm);

    println!(
        "{} patterns ({} templates, key layer {}, straight id {})",
        algorithm,
        library.templates().len(),
        library.key_layer(),
        library.straight_id()
    );
    println!("x = template cell, . = envelope cell\n");

    for template in library.templates() {
        let bend = match template.bend {
            Some(0) => "left",
            Some(_) => "right",
            None => "-",
        };
        println!("pattern {:>2}  bend {:<5}  cells {}", template.id, bend, template.cells.len());
        if let Some(grid) = library.render(template.id) {
            print!("{grid}");
        }
        println!();
    }
}
