//! Backend access: the control-plane trait, its HTTP implementation and the
//! server-push decoder used for log streams.

pub mod client;
pub mod sse;
#[cfg(test)]
pub mod testing;
