pub mod address;
pub mod fixed_point;
pub mod mode;
pub mod records;

pub use address::{Address, AddressError};
pub use fixed_point::{ArithmeticError, SCALE_10, SCALE_18, checked_div};
pub use mode::{AveragingMode, ParseModeError};
pub use records::{
    Aggregate, LastPointer, Metadata, Observation, Sample, SampleId, TransactionCountSnapshot,
};
