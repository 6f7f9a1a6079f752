//! Outbound HTTP over reqwest

mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;
