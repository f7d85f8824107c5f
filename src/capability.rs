// SPDX-License-Identifier: GPL-3.0-only

//! Runtime environment detection
//!
//! [`DeviceCapabilityProfile::detect`] inspects ambient environment signals
//! once per session and exposes them read-only. Detection never fails:
//! unknown environments fall back to conservative desktop-like values.
//! Orientation is the only field cheap enough to recompute mid-session
//! (see [`DeviceCapabilityProfile::with_orientation`]).

use serde::{Deserialize, Serialize};

/// Operating system family, as far as the host environment reveals it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OsFamily {
    Android,
    Ios,
    Linux,
    MacOs,
    Windows,
    #[default]
    Unknown,
}

/// Browser/webview family when the engine is embedded behind one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrowserFamily {
    Chromium,
    Firefox,
    Safari,
    #[default]
    Unknown,
}

/// Coarse screen size class driving configuration heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScreenClass {
    /// Phone-sized
    Compact,
    /// Tablet-sized
    Medium,
    #[default]
    Expanded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    #[default]
    Landscape,
}

/// Ambient environment signals supplied by the host
///
/// All fields are optional; `None` means "not known here", which detection
/// resolves to desktop-safe defaults. A headless host can pass
/// `EnvironmentHints::default()`.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentHints {
    /// User-agent style identification string, when the host runs in or
    /// behind a browser/webview
    pub user_agent: Option<String>,
    /// Whether the page/transport is secure (camera capture requires it)
    pub secure_context: Option<bool>,
    /// Physical screen size in pixels (width, height)
    pub screen: Option<(u32, u32)>,
    /// Whether a capture API is reachable at all
    pub capture_api: Option<bool>,
    /// Whether the device can vibrate on a successful match
    pub vibration: Option<bool>,
    /// Logical CPU count reported by the host
    pub hardware_concurrency: Option<usize>,
}

/// Immutable snapshot of what the runtime environment can do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilityProfile {
    pub is_mobile: bool,
    pub os_family: OsFamily,
    pub browser_family: BrowserFamily,
    pub is_secure_context: bool,
    pub has_capture_api: bool,
    pub has_vibration: bool,
    pub hardware_concurrency_hint: usize,
    pub screen_class: ScreenClass,
    pub orientation: Orientation,
}

impl Default for DeviceCapabilityProfile {
    fn default() -> Self {
        Self {
            is_mobile: false,
            os_family: OsFamily::Unknown,
            browser_family: BrowserFamily::Unknown,
            is_secure_context: true,
            has_capture_api: true,
            has_vibration: false,
            hardware_concurrency_hint: 4,
            screen_class: ScreenClass::Expanded,
            orientation: Orientation::Landscape,
        }
    }
}

impl DeviceCapabilityProfile {
    /// Detect capabilities from host-provided hints
    ///
    /// Pure apart from reading `available_parallelism` when the host gives
    /// no concurrency hint. Never panics and never errors.
    pub fn detect(hints: &EnvironmentHints) -> Self {
        let ua = hints
            .user_agent
            .as_deref()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let os_family = detect_os(&ua);
        let is_mobile = matches!(os_family, OsFamily::Android | OsFamily::Ios)
            || ua.contains("mobile")
            || ua.contains("tablet");

        let (screen_class, orientation) = hints
            .screen
            .map(|(w, h)| (classify_screen(w, h), orientation_of(w, h)))
            .unwrap_or_default();

        let hardware_concurrency_hint = hints
            .hardware_concurrency
            .or_else(|| std::thread::available_parallelism().ok().map(|p| p.get()))
            .unwrap_or(4);

        Self {
            is_mobile,
            os_family,
            browser_family: detect_browser(&ua),
            is_secure_context: hints.secure_context.unwrap_or(true),
            has_capture_api: hints.capture_api.unwrap_or(true),
            has_vibration: hints.vibration.unwrap_or(is_mobile),
            hardware_concurrency_hint,
            screen_class,
            orientation,
        }
    }

    /// Detect from the local process environment (no host hints)
    pub fn detect_local() -> Self {
        let os_family = match std::env::consts::OS {
            "linux" => OsFamily::Linux,
            "macos" => OsFamily::MacOs,
            "windows" => OsFamily::Windows,
            "android" => OsFamily::Android,
            "ios" => OsFamily::Ios,
            _ => OsFamily::Unknown,
        };
        Self {
            os_family,
            is_mobile: matches!(os_family, OsFamily::Android | OsFamily::Ios),
            ..Self::detect(&EnvironmentHints::default())
        }
    }

    /// Recompute orientation/screen class after a rotation; everything else
    /// is session-stable.
    pub fn with_orientation(&self, width: u32, height: u32) -> Self {
        Self {
            screen_class: classify_screen(width, height),
            orientation: orientation_of(width, height),
            ..self.clone()
        }
    }
}

fn detect_os(ua: &str) -> OsFamily {
    if ua.contains("android") {
        OsFamily::Android
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        OsFamily::Ios
    } else if ua.contains("windows") {
        OsFamily::Windows
    } else if ua.contains("mac os") || ua.contains("macintosh") {
        OsFamily::MacOs
    } else if ua.contains("linux") {
        OsFamily::Linux
    } else {
        OsFamily::Unknown
    }
}

fn detect_browser(ua: &str) -> BrowserFamily {
    // Order matters: Chromium UAs also contain "safari", Edge contains "chrome".
    if ua.contains("firefox") {
        BrowserFamily::Firefox
    } else if ua.contains("chrome") || ua.contains("chromium") || ua.contains("edg") {
        BrowserFamily::Chromium
    } else if ua.contains("safari") {
        BrowserFamily::Safari
    } else {
        BrowserFamily::Unknown
    }
}

fn classify_screen(width: u32, height: u32) -> ScreenClass {
    match width.min(height) {
        0..=719 => ScreenClass::Compact,
        720..=1199 => ScreenClass::Medium,
        _ => ScreenClass::Expanded,
    }
}

fn orientation_of(width: u32, height: u32) -> Orientation {
    if height > width {
        Orientation::Portrait
    } else {
        Orientation::Landscape
    }
}
