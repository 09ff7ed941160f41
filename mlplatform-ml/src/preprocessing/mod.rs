//! Feature preprocessing with standard scaling for numeric columns and one-hot
//! encoding for categorical columns, combined by a [`ColumnTransformer`].

pub mod encoder;
pub mod scaler;
pub mod transformer;

pub use encoder::OneHotEncoder;
pub use scaler::StandardScaler;
pub use transformer::ColumnTransformer;
