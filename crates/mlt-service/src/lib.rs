//! Service graph nodes: the producer/filter/transition polymorphism frames
//! flow through.

pub mod producer;
pub mod service;

pub use producer::{Cut, Producer, ProducerCore};
pub use service::{Filter, FilterScope, ServiceKind, Transition};
