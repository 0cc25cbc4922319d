pub mod download;
pub mod layout;
pub mod manager;
pub mod probe;
pub mod registry;

pub use download::{Fetcher, HttpTransport, Transport};
pub use layout::{Category, Layout};
pub use manager::ModelManager;
pub use probe::{InstallStatus, Prober};
pub use registry::{AssetEntry, Bundle, Catalog, VariantSet, WorkflowFile};
