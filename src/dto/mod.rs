pub mod conversation_dto;
pub mod number_dto;
pub mod webhook_dto;
pub mod workflow_dto;
