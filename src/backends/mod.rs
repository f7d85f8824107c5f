// SPDX-License-Identifier: GPL-3.0-only

//! Capture and decode backends

pub mod camera;
pub mod decode;
