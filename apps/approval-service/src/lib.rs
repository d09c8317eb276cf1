//! # Approval Service ライブラリ
//!
//! 経費承認エンジンのユースケースとハンドラを公開する。

pub mod config;
pub mod error;
pub mod handler;
pub mod usecase;
