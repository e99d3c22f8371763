//! Configuration module

mod site;

pub use site::BakerConfig;
pub use site::ServerConfig;
pub use site::SiteConfig;
pub use site::SiteSection;
