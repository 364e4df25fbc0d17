//! Statistics over review results

pub mod quartile;

pub use quartile::label_quartiles;
