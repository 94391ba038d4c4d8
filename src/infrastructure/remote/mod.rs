pub mod catalog;
pub mod download;
pub mod http_client;
pub mod platform;

pub use catalog::{find_version, AdoptiumCatalog, CatalogClient, VersionDescriptor};
pub use download::{ArtifactFetcher, DownloadOptions, Downloader, FetchedArtifact};
pub use http_client::HttpClient;
pub use platform::Platform;
