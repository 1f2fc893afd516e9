//! Host processor identification for report headers.

/// Human-readable processor name, best effort.
pub fn processor_name() -> String {
    platform_processor_name().unwrap_or_else(|| String::from("unknown processor"))
}

#[cfg(target_os = "linux")]
fn platform_processor_name() -> Option<String> {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    parse_model_name(&cpuinfo)
}

#[cfg(target_os = "macos")]
fn platform_processor_name() -> Option<String> {
    let output = std::process::Command::new("sysctl")
        .arg("-n")
        .arg("machdep.cpu.brand_string")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn platform_processor_name() -> Option<String> {
    None
}

/// Pull the first `model name` value out of /proc/cpuinfo content.
#[allow(dead_code)] // Only called on Linux; kept portable for tests
fn parse_model_name(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|line| line.starts_with("model name"))
        .and_then(|line| line.split(':').next_back())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}
