pub mod batch;
pub mod config;
pub mod diff;
pub mod entities;
pub mod extract;
pub mod inheritance;
pub mod markup;
pub mod model;
pub mod naming;
pub mod projections;
pub mod report;
pub mod runtime;
pub mod sections;
pub mod source;
pub mod table;
