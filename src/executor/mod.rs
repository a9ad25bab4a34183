pub mod row;
pub use row::*;

pub mod tabular_result;
pub use tabular_result::*;

pub mod flatten;
pub use flatten::*;

pub mod execution_error;
pub use execution_error::*;

pub mod query_executor;
pub use query_executor::*;

pub mod relational;
pub use relational::*;

pub mod document;
pub use document::*;

pub mod postgres;
pub use postgres::PgRelationalClient;

pub mod mongo;
pub use mongo::MongoDocumentClient;
