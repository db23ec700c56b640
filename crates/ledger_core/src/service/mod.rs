//! Use-case services built on the repository and transaction layers.

pub mod member_service;
