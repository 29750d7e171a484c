//! Testing utilities for installflow.
//!
//! This module provides:
//! - [`ManualTaskRunner`], a runner whose tasks end when the test says so
//! - [`ScriptedInstaller`], an installer following a per-step script

mod installer;
mod runner;

pub use installer::{Script, ScriptedInstaller};
pub use runner::{ManualTaskRunner, StartedTask};
