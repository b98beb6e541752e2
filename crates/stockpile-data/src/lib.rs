pub mod loader;
pub mod schema;

pub use loader::{load_network_data, CrafterDef, DataLoadError, NetworkData};
