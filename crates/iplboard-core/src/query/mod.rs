//! Query templates and the statement builder

pub mod builder;
pub mod dialect;
pub mod template;

pub use builder::{QueryBuilder, Statement};
pub use dialect::Dialect;
pub use template::{QueryTemplate, SeasonScope, TemplateCatalog, BUILTIN_TEMPLATES};
