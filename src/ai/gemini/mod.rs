pub mod client;
pub mod content;
pub mod factory;
pub mod files;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use content::GeminiContentClient;
pub use factory::GeminiClientFactory;
pub use files::GeminiFileClient;
