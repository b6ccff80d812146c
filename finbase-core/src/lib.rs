pub mod breeding;
pub mod model;
pub mod schema_diagram;
pub mod summary;
