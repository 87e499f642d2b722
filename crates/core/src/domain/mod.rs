pub mod buyer;
pub mod checkout;
pub mod discount;
pub mod fulfillment;
pub mod order;
pub mod payment;
pub mod product;
