pub mod ingest_service;
pub mod message_service;
pub mod normalizer;
pub mod send_service;
pub mod session_service;
pub mod whatsapp_api;
