//! The rule catalog, grouped by what the rules look at

pub mod contents;
pub mod definitions;
pub mod geometry;
pub mod naming;
pub mod rtree;
pub mod srs;

/// Geometry types a GeoPackage layer may declare
pub const VALID_GEOMETRIES: [&str; 6] = [
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
];
