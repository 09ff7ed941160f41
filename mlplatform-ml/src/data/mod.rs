//! Tabular data: typed datasets, CSV I/O, and row-level transforms.

pub mod csv_io;
pub mod dataset;
pub mod transform;

pub use csv_io::{parse_csv, read_csv, to_csv_bytes, write_csv};
pub use dataset::{Cell, ColumnKind, Dataset};
pub use transform::{BinaryLabelMapping, sample_rows, train_test_split};
