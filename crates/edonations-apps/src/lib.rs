pub mod registry;

pub use registry::{AppDescriptor, AppRegistry, donations_app};
