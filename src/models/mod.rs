pub mod conversation;
pub mod message;
pub mod whatsapp_number;
pub mod workflow;
