pub mod candles;
pub mod exchange;
pub mod failover;
pub mod universe;

pub use candles::{CandleFetch, CandleFetcher};
pub use exchange::{ExchangeFlavor, HttpTransport, Transport};
pub use failover::{EndpointPool, FailoverRouter};
pub use universe::UniverseSelector;
