//! Data models for kalam-bind.
//!
//! Defines the values exchanged with the sync transport and exposed to
//! observers: credentials, users, query descriptors and subscription
//! mutations.

pub mod batch_receipt;
pub mod credentials;
pub mod query_descriptor;
pub mod subscription_id;
pub mod subscription_info;
pub mod subscription_mutation;
pub mod subscription_status;
pub mod user;


pub use batch_receipt::BatchReceipt;
pub use credentials::{Credentials, RegisterFields, ResetPasswordRequest};
pub use query_descriptor::QueryDescriptor;
pub use subscription_id::SubscriptionId;
pub use subscription_info::SubscriptionInfo;
pub use subscription_mutation::{SubscriptionMutation, SubscriptionOperation};
pub use subscription_status::SubscriptionStatus;
pub use user::User;
