mod checksum;
mod column;
mod frame;
mod loader;
mod value;

pub use column::{Column, ColumnDescriptor, DataType, SemanticType};
pub use frame::{Dataset, DatasetSummary};
pub use loader::{DatasetLoader, LoadOptions};
pub use value::Value;
