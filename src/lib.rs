pub mod artifact;
pub mod config;
pub mod events;
pub mod node;
pub mod resolver;
pub mod settings;
pub mod supervisor;
pub mod version;
