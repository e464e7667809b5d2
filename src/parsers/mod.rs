pub mod abundance;
pub mod alias;
pub mod grid;
pub mod readme;
pub mod svg;

pub use abundance::parse_abundance_matrix;
pub use alias::parse_alias_table;
pub use grid::parse_grid;
pub use readme::render_readme;
pub use svg::clean_svg;

pub(crate) fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line))
}
