pub mod gateway;
pub mod signature;

pub use gateway::{GatewayOrder, OrderRequest, PaymentGateway, RazorpayGateway};

#[cfg(any(test, feature = "test-utils"))]
pub use gateway::FakeGateway;
