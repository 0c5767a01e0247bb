pub mod conversations;
pub mod health;
pub mod numbers;
pub mod webhooks;
pub mod workflows;
