pub mod chat;

pub use chat::{
    EnterRequest, EnterResponse, GetMessagesParams, GetMessagesResponse, SayRequest, SayResponse,
};
