pub mod aggregate;
pub mod bands;
pub mod energy;
pub mod features;
pub mod mailbox;
pub mod peaks;
pub mod publisher;
pub mod sampler;
pub mod settings;

pub use features::FeatureSnapshot;
pub use publisher::{FeaturePublisher, Subscriber, SubscriptionId};
pub use settings::{AnalyzerConfig, DetectorConfig, PartialConfig};
