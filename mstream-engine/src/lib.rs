pub mod cluster_feature;
pub mod cluster_vector;
pub mod clusterer;
pub mod config;
pub mod document;
pub mod error;
pub mod id_pool;
pub mod protocol;
pub mod sampling;
pub mod server;
pub mod snapshot;
pub mod transport;
pub mod types;
pub mod vocabulary;

pub use clusterer::StreamClusterer;
pub use config::ClustererConfig;
pub use error::ClusterError;
pub use snapshot::ModelSnapshot;
pub use types::{BatchDocument, TermWeight, TopicTerms};
