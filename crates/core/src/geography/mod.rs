pub mod filter;
pub mod profile;

pub use filter::{
    GeographyClause, GeographyColumns, GeographyFilter, GeographyFilterBuilder, RecordGeography,
    ScopeRequest, ScopeResolution, SqlPredicate,
};
pub use profile::{GeographyDirectory, InMemoryGeographyDirectory};
