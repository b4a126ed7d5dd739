//! Terminal client for the bomber arena: connects over TCP, keeps the
//! latest server snapshot in a watch slot, and renders it as plain text.

pub mod input;
pub mod network;
pub mod rendering;
