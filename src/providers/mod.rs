pub mod caching;
pub mod frankfurter;
pub mod util;

pub use caching::RateLookupClient;
pub use frankfurter::FrankfurterProvider;
