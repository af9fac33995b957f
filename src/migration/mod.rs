//! Export of source-tenant security groups and their re-creation in a
//! destination tenant.

pub mod dataset;
pub mod export;
pub mod import;
pub mod model;
pub mod resolver;
pub mod summary;
