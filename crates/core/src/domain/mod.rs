pub mod order;
pub mod payment;
pub mod ticket;
