//! Generic result containers produced by the façade.

mod reader;
mod row;
mod set;
mod table;

pub use reader::DataReader;
pub use row::{DataColumn, DataRow};
pub use set::DataSet;
pub use table::DataTable;
