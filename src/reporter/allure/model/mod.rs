pub mod attachment;
pub mod label;
pub mod link;
pub mod parameter;
pub mod status;
pub mod test_result;

pub use attachment::Attachment;
pub use label::Label;
pub use link::Link;
pub use parameter::Parameter;
pub use status::{Status, StatusDetails};
pub use test_result::{ExecutableItem, TestResult};
