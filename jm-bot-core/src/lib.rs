#![doc = "jm-bot-core: core logic library for jm-bot."]

//! This crate holds the data models, the `/jm` command parser, chapter
//! selection, the crawler bridge, PDF assembly and the orchestration that
//! ties them together. HTTP delivery to the chat host lives in the `jm-bot`
//! crate behind the [`contract::Uploader`] and [`contract::ChatResponder`]
//! traits.

pub mod assemble;
pub mod command;
pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod selection;
