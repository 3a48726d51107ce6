//! Embeds the build time as `HWP_BUILD_TIME`, reported by `GET /health`.
//!
//! `SOURCE_DATE_EPOCH` pins the value for reproducible builds.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    let build_time = match std::env::var("SOURCE_DATE_EPOCH") {
        Ok(epoch) => format_date(&["-u", "-d", &format!("@{epoch}"), "+%Y-%m-%dT%H:%M:%SZ"]),
        Err(_) => format_date(&["-u", "+%Y-%m-%dT%H:%M:%SZ"]),
    };
    println!("cargo:rustc-env=HWP_BUILD_TIME={build_time}");
}

fn format_date(args: &[&str]) -> String {
    Command::new("date")
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
