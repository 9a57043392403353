//! Backend credentials: bearer token model, on-disk cache and interactive acquisition.

pub mod acquirer;
pub mod cache;
pub mod token;

pub use acquirer::{BrowserDriver, BrowserLaunchOptions, BrowserSession, InteractiveTokenAcquirer};
pub use cache::TokenCache;
pub use token::Token;
